//! Types for use when configuring block service modules.

use crate::*;

/// helper transcode function
fn tc<S: serde::Serialize, D: serde::de::DeserializeOwned>(
    s: &S,
) -> TbsResult<D> {
    serde_json::from_str(
        &serde_json::to_string(s)
            .map_err(|e| TbsError::other_src("encode", e))?,
    )
    .map_err(|e| TbsError::other_src("decode", e))
}

/// Denotes a type used to configure a specific module.
///
/// These are settings that cannot change at runtime, the likes of which
/// would be found in a configuration file. Module configs should be
/// tolerant to missing properties (`#[serde(default)]`), since the file
/// may be edited by hand.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

/// Block service configuration, keyed by module name.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config(serde_json::Map<String, serde_json::Value>);

impl Config {
    /// Called by module factories when generating a default or example
    /// configuration. Refuses to overwrite a module of the same name.
    pub fn add_default_module_config<M: ModConfig>(
        &mut self,
        module_name: String,
    ) -> TbsResult<()> {
        if self.0.contains_key(&module_name) {
            return Err(TbsError::other(format!(
                "Refusing to overwrite conflicting module name: {module_name}"
            )));
        }
        self.0.insert(module_name, tc(&M::default())?);
        Ok(())
    }

    /// Replace the config of a module, e.g. to tune it before building.
    pub fn set_module_config<M: ModConfig>(
        &mut self,
        module_name: String,
        module_config: &M,
    ) -> TbsResult<()> {
        self.0.insert(module_name, tc(module_config)?);
        Ok(())
    }

    /// Extract a module config. Unset modules get their default.
    pub fn get_module_config<M: ModConfig>(
        &self,
        module_name: &str,
    ) -> TbsResult<M> {
        self.0
            .get(module_name)
            .map(tc)
            .unwrap_or_else(|| Ok(M::default()))
    }
}

/// Module name of [BlockServiceConfig].
pub const BLOCK_SERVICE_MOD_NAME: &str = "blockService";

/// Configuration of the block service facade itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockServiceConfig {
    /// Skip writing (and announcing) blocks the local store already
    /// holds. Default: true.
    pub check_first: bool,
}

impl Default for BlockServiceConfig {
    fn default() -> Self {
        Self { check_first: true }
    }
}

impl ModConfig for BlockServiceConfig {}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    #[serde(default, rename_all = "camelCase")]
    struct Tier {
        urls: Vec<String>,
        timeout_ms: u32,
    }

    impl Default for Tier {
        fn default() -> Self {
            Self {
                urls: Vec::new(),
                timeout_ms: 5000,
            }
        }
    }

    impl ModConfig for Tier {}

    #[test]
    fn default_config_output() {
        let mut config = Config::default();
        config.add_default_module_config::<Tier>("tier".into()).unwrap();

        assert_eq!(
            r#"{"tier":{"urls":[],"timeoutMs":5000}}"#,
            serde_json::to_string(&config).unwrap()
        );

        assert!(config
            .add_default_module_config::<Tier>("tier".into())
            .is_err());
    }

    #[test]
    fn tolerant_loading() {
        let config: Config = serde_json::from_str(
            r#"{
          "bad": { "foo": "bar" },
          "tier": { "urls": ["http://a"], "extra": 1 }
        }"#,
        )
        .unwrap();

        assert_eq!(
            Tier {
                urls: vec!["http://a".into()],
                timeout_ms: 5000,
            },
            config.get_module_config::<Tier>("tier").unwrap()
        );

        assert_eq!(
            Tier::default(),
            config.get_module_config::<Tier>("not-set").unwrap()
        );
    }

    #[test]
    fn set_overrides_default() {
        let mut config = Config::default();
        config.add_default_module_config::<Tier>("tier".into()).unwrap();
        config
            .set_module_config(
                "tier".into(),
                &Tier {
                    urls: vec![],
                    timeout_ms: 10,
                },
            )
            .unwrap();

        assert_eq!(
            10,
            config.get_module_config::<Tier>("tier").unwrap().timeout_ms
        );
    }
}
