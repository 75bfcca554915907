/*
 * Copyright 2019 Cargill Incorporated
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * -----------------------------------------------------------------------------
 */

//! A name to factory registry of endorsement plugins.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::error::InvalidArgumentError;

use super::{PluginFactory, PluginMapper};

/// The plugins known to a peer, by name.
pub struct PluginRegistry {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
}

impl PluginRegistry {
    pub fn names(&self) -> Vec<&str> {
        let mut names = self.factories.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl PluginMapper for PluginRegistry {
    fn plugin_factory_by_name(&self, name: &str) -> Option<Arc<dyn PluginFactory>> {
        self.factories.get(name).cloned()
    }
}

#[derive(Debug)]
pub enum PluginRegistryBuildError {
    MissingField(String),
    DuplicatePlugin(String),
    InvalidArgument(InvalidArgumentError),
}

impl Error for PluginRegistryBuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PluginRegistryBuildError::InvalidArgument(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for PluginRegistryBuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PluginRegistryBuildError::MissingField(s) => write!(f, "MissingField: {}", s),
            PluginRegistryBuildError::DuplicatePlugin(name) => {
                write!(f, "plugin with name {} was registered more than once", name)
            }
            PluginRegistryBuildError::InvalidArgument(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Default)]
pub struct PluginRegistryBuilder {
    factories: Vec<(String, Arc<dyn PluginFactory>)>,
}

impl PluginRegistryBuilder {
    pub fn new() -> Self {
        PluginRegistryBuilder::default()
    }

    pub fn with_plugin(mut self, name: &str, factory: Arc<dyn PluginFactory>) -> Self {
        self.factories.push((name.to_string(), factory));
        self
    }

    /// Registers the plugins shipped with this library under their conventional names.
    #[cfg(feature = "builtin-plugins")]
    pub fn with_builtins(self) -> Self {
        self.with_plugin(
            super::builtin::DEFAULT_ENDORSEMENT_PLUGIN,
            Arc::new(super::builtin::DefaultEndorsementFactory),
        )
    }

    pub fn build(self) -> Result<PluginRegistry, PluginRegistryBuildError> {
        if self.factories.is_empty() {
            return Err(PluginRegistryBuildError::MissingField(
                "at least one plugin is required".to_string(),
            ));
        }

        let mut factories = HashMap::new();
        for (name, factory) in self.factories {
            if name.is_empty() {
                return Err(PluginRegistryBuildError::InvalidArgument(
                    InvalidArgumentError::new(
                        "name".to_string(),
                        "plugin names must not be empty".to_string(),
                    ),
                ));
            }
            if factories.contains_key(&name) {
                return Err(PluginRegistryBuildError::DuplicatePlugin(name));
            }
            factories.insert(name, factory);
        }

        Ok(PluginRegistry { factories })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::plugin::{Dependency, Plugin, PluginError};
    use crate::protocol::proposal::SignedProposal;
    use crate::protocol::response::Endorsement;

    struct NoopPlugin;

    impl Plugin for NoopPlugin {
        fn init(&mut self, _dependencies: &[Dependency]) -> Result<(), PluginError> {
            Ok(())
        }

        fn endorse(
            &self,
            payload: &[u8],
            _signed_proposal: &SignedProposal,
        ) -> Result<(Endorsement, Vec<u8>), PluginError> {
            Ok((Endorsement::default(), payload.to_vec()))
        }
    }

    struct NoopFactory;

    impl PluginFactory for NoopFactory {
        fn new_plugin(&self) -> Box<dyn Plugin> {
            Box::new(NoopPlugin)
        }
    }

    /// Tests that registered factories are resolved by name and unknown names are not.
    #[test]
    fn lookup_by_name() {
        let registry = PluginRegistryBuilder::new()
            .with_plugin("noop", Arc::new(NoopFactory))
            .build()
            .expect("unable to build registry");

        assert!(registry.plugin_factory_by_name("noop").is_some());
        assert!(registry.plugin_factory_by_name("other").is_none());
        assert_eq!(vec!["noop"], registry.names());
    }

    /// Tests that names must be unique and non-empty, and that a registry cannot be empty.
    #[test]
    fn invalid_registries() {
        match PluginRegistryBuilder::new()
            .with_plugin("noop", Arc::new(NoopFactory))
            .with_plugin("noop", Arc::new(NoopFactory))
            .build()
        {
            Err(PluginRegistryBuildError::DuplicatePlugin(name)) => assert_eq!("noop", name),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("duplicate plugin was accepted"),
        }

        match PluginRegistryBuilder::new()
            .with_plugin("", Arc::new(NoopFactory))
            .build()
        {
            Err(err @ PluginRegistryBuildError::InvalidArgument(_)) => assert_eq!(
                "name is invalid: plugin names must not be empty",
                err.to_string()
            ),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("unnamed plugin was accepted"),
        }

        match PluginRegistryBuilder::new().build() {
            Err(PluginRegistryBuildError::MissingField(_)) => (),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("empty registry was accepted"),
        }
    }

    /// Tests that the builtins are registered under their conventional name.
    #[cfg(feature = "builtin-plugins")]
    #[test]
    fn builtins() {
        let registry = PluginRegistryBuilder::new()
            .with_builtins()
            .build()
            .expect("unable to build registry");
        assert_eq!(vec!["escc"], registry.names());
    }
}
