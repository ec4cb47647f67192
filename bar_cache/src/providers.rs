//! Provider registry that maps a configured ProviderId to a concrete provider.
use market_data_ingestor::providers::{DataProvider, ProviderInitError, yahoo_rest::YahooProvider};
use serde::{Deserialize, Serialize};

/// Which upstream to use (serde snake_case).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Yahoo Finance chart API.
    #[default]
    Yahoo,
}

/// Build and return a boxed data provider corresponding to the supplied ProviderId.
pub fn build_provider(
    id: ProviderId,
) -> Result<Box<dyn DataProvider + Send + Sync>, ProviderInitError> {
    match id {
        ProviderId::Yahoo => {
            let p = YahooProvider::new()?;
            Ok(Box::new(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_is_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            provider: ProviderId,
        }
        let h: Holder = toml::from_str(r#"provider = "yahoo""#).unwrap();
        assert_eq!(h.provider, ProviderId::Yahoo);
        assert!(toml::from_str::<Holder>(r#"provider = "Yahoo""#).is_err());
    }

    #[test]
    fn builds_yahoo() {
        assert!(build_provider(ProviderId::Yahoo).is_ok());
    }
}
