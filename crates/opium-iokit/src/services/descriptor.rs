//! Services described purely by data.

use serde::{Deserialize, Serialize};

use crate::property::PropertyDictionary;
use crate::service::IoService;

/// Property and personality dictionaries for a data-only service.
///
/// ```json
/// { "properties": { "IOClass": "IOBus" }, "personality": { "IOProviderClass": "Root" } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDescriptor {
    pub properties: PropertyDictionary,
    pub personality: PropertyDictionary,
}

/// A service with no behaviour of its own beyond the trait defaults.
///
/// Useful for placing buses and other grouping nodes into the tree, or for
/// publishing a BSD name whose I/O is a sink.
pub struct DescriptorService {
    descriptor: ServiceDescriptor,
}

impl DescriptorService {
    pub fn new(descriptor: ServiceDescriptor) -> Self {
        Self { descriptor }
    }
}

impl IoService for DescriptorService {
    fn configure(
        &mut self,
        properties: &mut PropertyDictionary,
        personality: &mut PropertyDictionary,
    ) {
        properties.extend(self.descriptor.properties.clone());
        personality.extend(self.descriptor.personality.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{keys, PropertyValue};
    use crate::registry::IoRegistry;
    use opium_bsd::DeviceSwitchTable;
    use opium_hal::TestHal;

    #[test]
    fn test_descriptor_from_json() {
        let d: ServiceDescriptor = serde_json::from_str(
            r#"{"properties":{"IOClass":"IOBus","Lanes":4}}"#,
        )
        .unwrap();
        assert!(d.personality.is_empty());
        assert_eq!(d.properties.get("Lanes"), Some(&PropertyValue::Number(4)));
    }

    #[test]
    fn test_descriptor_service_matches_by_class() {
        let mut reg = IoRegistry::new(TestHal::shared(), DeviceSwitchTable::shared());
        let bus: ServiceDescriptor =
            serde_json::from_str(r#"{"properties":{"IOClass":"IOBus"}}"#).unwrap();
        let card: ServiceDescriptor = serde_json::from_str(
            r#"{"properties":{"IOClass":"IOCard"},"personality":{"IOProviderClass":"IOBus"}}"#,
        )
        .unwrap();

        let (card_id, _) = reg.add_service(DescriptorService::new(card));
        let (bus_id, _) = reg.add_service(DescriptorService::new(bus));
        reg.match_and_start_devices();

        assert_eq!(reg.provider(card_id), Some(bus_id));
        assert_eq!(
            reg.property(card_id, keys::IO_CLASS),
            Some(&PropertyValue::from("IOCard"))
        );
    }
}
