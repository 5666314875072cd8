//! LE advertisement
//!
//! The advertisement is a sibling object of the GATT application. The host
//! reads its properties once at registration and builds the advertising
//! payload from them; [`Advertisement::to_ad_data`] produces the same legacy
//! payload for inspection and `dump`.

use crate::gatt::{Properties, PropertyBag};
use crate::path::ObjectPath;
use crate::uuid::Uuid;
use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;
use tracing::info;

pub const LE_ADVERTISEMENT_IFACE: &str = "org.bluez.LEAdvertisement1";

/// Maximum size of a legacy advertising payload
pub const MAX_AD_LEN: usize = 31;

// Advertising Data Types
pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_128BIT_SERVICE_UUID_COMPLETE: u8 = 0x07;
pub const AD_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_TYPE_APPEARANCE: u8 = 0x19;

/// LE General Discoverable, BR/EDR not supported
const AD_FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

/// Generic Computer
pub const DEFAULT_APPEARANCE: u16 = 0x0340;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvertisementType {
    Peripheral,
    Broadcast,
}

impl AdvertisementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvertisementType::Peripheral => "peripheral",
            AdvertisementType::Broadcast => "broadcast",
        }
    }
}

/// How the peripheral announces itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advertisement {
    path: ObjectPath,
    kind: AdvertisementType,
    local_name: String,
    service_uuids: Vec<Uuid>,
    appearance: u16,
    include_tx_power: bool,
}

impl Advertisement {
    /// A connectable peripheral advertisement with the default appearance
    pub fn new(path: ObjectPath, local_name: impl Into<String>) -> Self {
        Self {
            path,
            kind: AdvertisementType::Peripheral,
            local_name: local_name.into(),
            service_uuids: Vec::new(),
            appearance: DEFAULT_APPEARANCE,
            include_tx_power: false,
        }
    }

    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        if !self.service_uuids.contains(&uuid) {
            self.service_uuids.push(uuid);
        }
        self
    }

    pub fn with_appearance(mut self, appearance: u16) -> Self {
        self.appearance = appearance;
        self
    }

    pub fn with_tx_power(mut self, include: bool) -> Self {
        self.include_tx_power = include;
        self
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn kind(&self) -> AdvertisementType {
        self.kind
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn service_uuids(&self) -> &[Uuid] {
        &self.service_uuids
    }

    pub fn appearance(&self) -> u16 {
        self.appearance
    }

    /// Called by the host when it drops the advertisement
    pub fn release(&self) {
        info!("Advertisement {} released", self.path);
    }

    /// Encode the legacy advertising payload.
    ///
    /// Structures that do not fit are dropped in reverse priority order; the
    /// local name is shortened before being dropped.
    pub fn to_ad_data(&self) -> Vec<u8> {
        let mut data = vec![2, AD_TYPE_FLAGS, AD_FLAGS_GENERAL_DISCOVERABLE];

        if !self.service_uuids.is_empty() {
            let len = 1 + 16 * self.service_uuids.len();
            if data.len() + 1 + len <= MAX_AD_LEN {
                data.push(len as u8);
                data.push(AD_TYPE_128BIT_SERVICE_UUID_COMPLETE);
                for uuid in &self.service_uuids {
                    data.extend_from_slice(&uuid.to_bytes_le());
                }
            }
        }

        if data.len() + 4 <= MAX_AD_LEN {
            data.push(3);
            data.push(AD_TYPE_APPEARANCE);
            // Writing into a Vec cannot fail.
            let _ = data.write_u16::<LittleEndian>(self.appearance);
        }

        let name = self.local_name.as_bytes();
        let room = MAX_AD_LEN.saturating_sub(data.len() + 2);
        if !name.is_empty() && room > 0 {
            let (ad_type, name) = if name.len() <= room {
                (AD_TYPE_COMPLETE_LOCAL_NAME, name)
            } else {
                (AD_TYPE_SHORT_LOCAL_NAME, &name[..room])
            };
            data.push(name.len() as u8 + 1);
            data.push(ad_type);
            data.extend_from_slice(name);
        }

        data
    }
}

impl Properties for Advertisement {
    fn interface(&self) -> &'static str {
        LE_ADVERTISEMENT_IFACE
    }

    fn properties(&self) -> PropertyBag {
        PropertyBag::new(LE_ADVERTISEMENT_IFACE)
            .with("Type", self.kind.as_str())
            .with("LocalName", self.local_name.clone())
            .with(
                "ServiceUUIDs",
                self.service_uuids
                    .iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>(),
            )
            .with("Appearance", self.appearance)
            .with("IncludeTxPower", self.include_tx_power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::PropertyValue;

    /// Split an advertising payload into `(type, data)` structures.
    ///
    /// Parsing stops at the first zero-length or truncated structure.
    fn parse_ad_structures(data: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut result = Vec::new();
        let mut i = 0;

        while i < data.len() {
            let length = data[i] as usize;
            if length == 0 || i + 1 + length > data.len() {
                break;
            }

            let ad_type = data[i + 1];
            let ad_data = data[i + 2..i + 1 + length].to_vec();

            result.push((ad_type, ad_data));

            i += 1 + length;
        }

        result
    }

    fn advertisement(name: &str) -> Advertisement {
        Advertisement::new(ObjectPath::new("/com/btpifi/advertisement0").unwrap(), name)
            .with_service_uuid("133934e0-01f5-4054-a88f-0136e064c49e".parse().unwrap())
    }

    #[test]
    fn test_properties() {
        let ad = advertisement("BtPiFi-A1B2");
        let bag = ad.properties();
        let names: Vec<_> = bag.names().collect();
        assert_eq!(
            names,
            ["Type", "LocalName", "ServiceUUIDs", "Appearance", "IncludeTxPower"]
        );
        assert_eq!(bag.get("Type").unwrap(), &PropertyValue::from("peripheral"));
        assert_eq!(bag.get("Appearance").unwrap(), &PropertyValue::U16(0x0340));
    }

    #[test]
    fn test_ad_data_fits_and_parses() {
        let ad = advertisement("Pi");
        let data = ad.to_ad_data();
        assert!(data.len() <= MAX_AD_LEN);

        let structures = parse_ad_structures(&data);
        assert_eq!(structures[0], (AD_TYPE_FLAGS, vec![0x06]));
        assert_eq!(structures[1].0, AD_TYPE_128BIT_SERVICE_UUID_COMPLETE);
        assert_eq!(structures[1].1[15], 0x13);
        assert_eq!(structures[2], (AD_TYPE_APPEARANCE, vec![0x40, 0x03]));
        assert_eq!(structures[3], (AD_TYPE_COMPLETE_LOCAL_NAME, b"Pi".to_vec()));
    }

    #[test]
    fn test_long_name_is_shortened() {
        let ad = advertisement("BtPiFi-Setup-Kitchen");
        let data = ad.to_ad_data();
        assert_eq!(data.len(), MAX_AD_LEN);

        let (ad_type, name) = parse_ad_structures(&data).pop().unwrap();
        assert_eq!(ad_type, AD_TYPE_SHORT_LOCAL_NAME);
        assert_eq!(name, b"BtPi");
    }

    #[test]
    fn test_parse_stops_at_truncated_structure() {
        let data = [0x02, 0x01, 0x06, 0x05, 0x09, b'a'];
        assert_eq!(parse_ad_structures(&data), vec![(0x01, vec![0x06])]);
        // A structure ending exactly at the buffer end is complete.
        let data = [0x02, 0x09, b'x'];
        assert_eq!(parse_ad_structures(&data), vec![(0x09, b"x".to_vec())]);
    }
}
