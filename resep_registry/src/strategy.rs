// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

/// How the composite service reacts to a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
pub enum AdaptationStrategy {
    /// Failures are reported as they are. It is the default strategy.
    #[default]
    NoAdaptation,
    /// The same service is called again, up to `max_attempts` calls in total.
    Retry { max_attempts: u32 },
    /// The call is issued to the other eligible services of the same type
    /// exposing the operation, in name order, until one succeeds.
    Failover,
}

impl std::fmt::Display for AdaptationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdaptationStrategy::NoAdaptation => write!(f, "no-adaptation"),
            AdaptationStrategy::Retry { max_attempts } => write!(f, "retry({})", max_attempts),
            AdaptationStrategy::Failover => write!(f, "failover"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_adaptation_strategy_from_toml() {
        #[derive(serde::Deserialize)]
        struct Holder {
            strategy: AdaptationStrategy,
        }
        let parse = |text: &str| toml::from_str::<Holder>(text).unwrap().strategy;
        assert_eq!(AdaptationStrategy::NoAdaptation, parse(r#"strategy = "NoAdaptation""#));
        assert_eq!(AdaptationStrategy::Failover, parse(r#"strategy = "Failover""#));
        assert_eq!(
            AdaptationStrategy::Retry { max_attempts: 3 },
            parse(r#"strategy = { Retry = { max_attempts = 3 } }"#)
        );
        assert!(toml::from_str::<Holder>(r#"strategy = "Pray""#).is_err());
        assert_eq!("retry(3)", AdaptationStrategy::Retry { max_attempts: 3 }.to_string());
    }
}
