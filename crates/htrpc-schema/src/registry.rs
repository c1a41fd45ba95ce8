use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::args::Args;
use crate::error::{Result, SchemaError};
use crate::validator::{CustomKind, Kind, Validator};

static GLOBAL: OnceLock<ValidatorRegistry> = OnceLock::new();

/// A user-defined validator kind.
///
/// `parse` receives non-null input only: the optional/required check runs
/// before it. Failures should use [`SchemaError::Invalid`] so that object
/// parents can prefix the path.
pub trait CustomValidator: Send + Sync {
    fn parse(&self, args: &Args, data: &Value, path: &str) -> Result<Value>;

    /// Extra documentation merged into the validator document. `None` makes
    /// the validator undocumentable.
    fn document(&self, _args: &Args) -> Option<Value> {
        None
    }
}

impl<F> CustomValidator for F
where
    F: Fn(&Args, &Value, &str) -> Result<Value> + Send + Sync,
{
    fn parse(&self, args: &Args, data: &Value, path: &str) -> Result<Value> {
        self(args, data, path)
    }
}

/// Named custom validator kinds.
///
/// A registry is built once and then either used directly through
/// [`ValidatorRegistry::validator`] or installed process-wide so that
/// [`Validator::named`] can resolve its kinds.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn CustomValidator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom kind. Names of built-in kinds and earlier
    /// registrations are rejected.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        validator: impl CustomValidator + 'static,
    ) -> Result<()> {
        let name = name.into();
        if Kind::builtin(&name).is_some() || self.validators.contains_key(&name) {
            return Err(SchemaError::DuplicateValidator(name));
        }
        tracing::debug!(validator = %name, "registered custom validator");
        self.validators.insert(name, Arc::new(validator));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomValidator>> {
        self.validators.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.validators.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Build a validator by kind name, built-ins first.
    pub fn validator(&self, name: &str, args: Args) -> Result<Validator> {
        if let Some(kind) = Kind::builtin(name) {
            return Ok(Validator::with_args(kind, args));
        }
        let validator = self
            .get(name)
            .ok_or_else(|| SchemaError::UnknownValidator(name.to_string()))?;
        let kind = Kind::Custom(CustomKind {
            name: name.to_string(),
            validator,
        });
        Ok(Validator::with_args(kind, args))
    }

    /// Install this registry process-wide. Only one install succeeds.
    pub fn install(self) -> Result<&'static Self> {
        let mut pending = Some(self);
        let installed = GLOBAL.get_or_init(|| pending.take().unwrap_or_default());
        if pending.is_some() {
            return Err(SchemaError::RegistryInstalled);
        }
        tracing::debug!(validators = ?installed.names(), "installed validator registry");
        Ok(installed)
    }

    /// The installed process-wide registry, if any.
    pub fn global() -> Option<&'static Self> {
        GLOBAL.get()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.names())
            .finish()
    }
}
