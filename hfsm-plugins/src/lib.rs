//! Concrete [`hfsm_core::Plugin`] bindings: `ECHO` and `FAIL` for tests and
//! demos, `HTTP` for real outbound calls.

mod echo;
mod fail;
mod http;

pub use echo::EchoPlugin;
pub use fail::FailPlugin;
pub use http::HttpPlugin;

use std::sync::Arc;

use hfsm_core::PluginRegistry;

/// A registry pre-populated with every binding this crate provides.
pub fn standard_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(EchoPlugin));
    registry.register(Arc::new(FailPlugin));
    registry.register(Arc::new(HttpPlugin::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_resolves_all_three_bindings() {
        let registry = standard_registry();
        assert!(registry.get("ECHO").is_ok());
        assert!(registry.get("FAIL").is_ok());
        assert!(registry.get("HTTP").is_ok());
    }
}
