//! Static adapter descriptors and lookup.
//!
//! Descriptors carry everything a caller needs before instantiating an
//! adapter: the identifier, the record kinds the site exposes, and the
//! known regional hosts. The registry is initialized lazily and lives for
//! the process lifetime.

use guichet_core::RecordKind;
use std::sync::OnceLock;

use crate::banquepopulaire;

// ============================================================================
// Adapter Descriptor
// ============================================================================

/// Static description of one site adapter.
pub struct AdapterDescriptor {
    /// Stable adapter identifier, lowercase.
    pub name: &'static str,
    /// Human-readable site name.
    pub display_name: &'static str,
    /// ISO country code of the site.
    pub country: &'static str,
    /// Known hosts this adapter can drive.
    pub websites: &'static [&'static str],
    /// Record kinds the adapter can extract.
    pub records: &'static [RecordKind],
}

impl AdapterDescriptor {
    /// Returns true if the adapter can extract the given kind.
    pub fn supports(&self, kind: RecordKind) -> bool {
        self.records.contains(&kind)
    }

    /// Returns true if the adapter drives the given host.
    pub fn drives(&self, website: &str) -> bool {
        self.websites.contains(&website)
    }
}

// ============================================================================
// Adapter Registry
// ============================================================================

/// Static storage for all adapter descriptors.
static DESCRIPTORS: OnceLock<Vec<AdapterDescriptor>> = OnceLock::new();

fn init_descriptors() -> Vec<AdapterDescriptor> {
    vec![banquepopulaire::descriptor()]
}

/// Global registry of all adapter descriptors.
pub struct AdapterRegistry;

impl AdapterRegistry {
    /// Returns all adapter descriptors.
    pub fn all() -> &'static [AdapterDescriptor] {
        DESCRIPTORS.get_or_init(init_descriptors)
    }

    /// Looks up an adapter by its identifier.
    pub fn get(name: &str) -> Option<&'static AdapterDescriptor> {
        Self::all().iter().find(|d| d.name == name)
    }

    /// Looks up the adapter driving the given host.
    pub fn for_website(website: &str) -> Option<&'static AdapterDescriptor> {
        Self::all().iter().find(|d| d.drives(website))
    }

    /// Returns all adapters able to extract the given kind.
    pub fn supporting(kind: RecordKind) -> Vec<&'static AdapterDescriptor> {
        Self::all().iter().filter(|d| d.supports(kind)).collect()
    }

    /// Returns the number of registered adapters.
    pub fn count() -> usize {
        Self::all().len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_by_name() {
        let desc = AdapterRegistry::get("banquepopulaire");
        assert!(desc.is_some());
        assert_eq!(desc.unwrap().country, "FR");
        assert!(AdapterRegistry::get("unknownbank").is_none());
    }

    #[test]
    fn test_registry_lookup_by_website() {
        let desc = AdapterRegistry::for_website("www.ibps.alsace.banquepopulaire.fr");
        assert!(desc.is_some());
        assert_eq!(desc.unwrap().name, "banquepopulaire");
    }

    #[test]
    fn test_supported_record_kinds() {
        let desc = AdapterRegistry::get("banquepopulaire").unwrap();
        assert!(desc.supports(RecordKind::Account));
        assert!(desc.supports(RecordKind::Transaction));
        assert!(desc.supports(RecordKind::Advisor));
        assert!(!desc.supports(RecordKind::Bill));

        assert_eq!(AdapterRegistry::supporting(RecordKind::Account).len(), 1);
        assert!(AdapterRegistry::supporting(RecordKind::Bill).is_empty());
    }

    #[test]
    fn test_count() {
        assert_eq!(AdapterRegistry::count(), 1);
    }
}
