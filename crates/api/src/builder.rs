//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general block service builder.
/// This contains both configuration and factory instances,
/// allowing construction of runtime module instances.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the builder.
    pub config: crate::config::Config,

    /// The [validate::CidValidator] applied at every entry point.
    pub validator: validate::DynCidValidator,

    /// The [edge::EdgeFactory] to be used for creating the edge tier.
    pub edge: edge::DynEdgeFactory,
}

impl Builder {
    /// Construct a default config given the configured module factories.
    /// Note, this should be called before freezing the Builder instance
    /// in an Arc<>.
    pub fn set_default_config(&mut self) -> TbsResult<()> {
        let Self {
            config,
            validator: _,
            edge,
        } = self;

        config.add_default_module_config::<BlockServiceConfig>(
            BLOCK_SERVICE_MOD_NAME.into(),
        )?;
        edge.default_config(config)?;

        Ok(())
    }

    /// Same as [Builder::set_default_config], consuming and returning self.
    pub fn with_default_config(mut self) -> TbsResult<Self> {
        self.set_default_config()?;
        Ok(self)
    }

    /// Validate the current configuration against every module factory.
    pub fn validate_config(&self) -> TbsResult<()> {
        self.config
            .get_module_config::<BlockServiceConfig>(BLOCK_SERVICE_MOD_NAME)?;
        self.edge.validate_config(&self.config)
    }

    /// Validate and freeze the builder.
    pub fn build(self) -> TbsResult<Arc<Self>> {
        self.validate_config()?;
        Ok(Arc::new(self))
    }
}
