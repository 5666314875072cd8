//! Provisioning service layout
//!
//! One primary service with five characteristics, each carrying a user
//! description descriptor. Characteristic UUIDs are derived from the service
//! UUID by replacing the last digit of its first group with the role number.

use super::controller::{ActionTimeouts, CommandController};
use super::handler::{ControllerWriter, WriteTarget};
use super::{EMPTY_SSID_LIST, STATUS_IDLE};
use crate::advertisement::{Advertisement, DEFAULT_APPEARANCE};
use crate::error::GattResult;
use crate::gatt::{Characteristic, CharacteristicFlags, Descriptor, Service};
use crate::object_manager::ObjectManager;
use crate::path::ObjectPath;
use crate::uuid::Uuid;
use crate::wifi::WifiProvider;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x133934e0_01f5_4054_a88f_0136e064c49e);
pub const DEFAULT_APP_PATH: &str = "/com/btpifi";
pub const DEFAULT_LOCAL_NAME: &str = "BtPiFi-Setup";

const ROLE_COMMAND: u8 = 1;
const ROLE_STATUS: u8 = 2;
const ROLE_SSID_LIST: u8 = 3;
const ROLE_SET_SSID: u8 = 4;
const ROLE_SET_PSK: u8 = 5;

/// Inputs for building the peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralSettings {
    pub app_path: ObjectPath,
    pub service_uuid: Uuid,
    pub local_name: String,
    pub appearance: u16,
    pub timeouts: ActionTimeouts,
}

impl Default for PeripheralSettings {
    fn default() -> Self {
        Self {
            app_path: ObjectPath::new(DEFAULT_APP_PATH).unwrap_or_else(|_| ObjectPath::root()),
            service_uuid: DEFAULT_SERVICE_UUID,
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            appearance: DEFAULT_APPEARANCE,
            timeouts: ActionTimeouts::default(),
        }
    }
}

/// Object paths of the provisioning service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralPaths {
    pub root: ObjectPath,
    pub service: ObjectPath,
    pub command: ObjectPath,
    pub status: ObjectPath,
    pub ssid_list: ObjectPath,
    pub set_ssid: ObjectPath,
    pub set_psk: ObjectPath,
    pub advertisement: ObjectPath,
}

impl PeripheralPaths {
    pub fn new(root: &ObjectPath) -> GattResult<Self> {
        let service = root.child("service0")?;
        Ok(Self {
            root: root.clone(),
            command: service.child("char0")?,
            status: service.child("char1")?,
            ssid_list: service.child("char2")?,
            set_ssid: service.child("char3")?,
            set_psk: service.child("char4")?,
            advertisement: root.child("advertisement0")?,
            service,
        })
    }
}

/// The fully wired provisioning peripheral, ready to be exported
pub struct Peripheral<P> {
    pub manager: ObjectManager,
    pub controller: CommandController<P>,
    pub paths: PeripheralPaths,
    pub advertisement: Advertisement,
}

impl<P: WifiProvider> Peripheral<P> {
    /// Build the tree bottom-up and link it top-down
    pub fn build(settings: &PeripheralSettings, provider: P, runtime: Handle) -> GattResult<Self> {
        let paths = PeripheralPaths::new(&settings.app_path)?;
        let uuid = settings.service_uuid;
        let service = Arc::new(Service::new(paths.service.clone(), uuid, true));

        let readable = CharacteristicFlags::READ | CharacteristicFlags::NOTIFY;
        let status = Arc::new(
            Characteristic::new(
                paths.status.clone(),
                uuid.with_role_digit(ROLE_STATUS),
                paths.service.clone(),
                readable,
            )
            .with_value(STATUS_IDLE),
        );
        let ssid_list = Arc::new(
            Characteristic::new(
                paths.ssid_list.clone(),
                uuid.with_role_digit(ROLE_SSID_LIST),
                paths.service.clone(),
                readable,
            )
            .with_value(EMPTY_SSID_LIST),
        );

        let controller = CommandController::new(
            provider,
            Arc::clone(&status),
            Arc::clone(&ssid_list),
            settings.timeouts,
            runtime,
        );

        let writer = |target| Arc::new(ControllerWriter::new(controller.clone(), target));
        let command = Arc::new(
            Characteristic::new(
                paths.command.clone(),
                uuid.with_role_digit(ROLE_COMMAND),
                paths.service.clone(),
                CharacteristicFlags::WRITE | CharacteristicFlags::WRITE_WITHOUT_RESPONSE,
            )
            .with_write_handler(writer(WriteTarget::Command)),
        );
        let set_ssid = Arc::new(
            Characteristic::new(
                paths.set_ssid.clone(),
                uuid.with_role_digit(ROLE_SET_SSID),
                paths.service.clone(),
                CharacteristicFlags::WRITE,
            )
            .with_write_handler(writer(WriteTarget::Ssid)),
        );
        let set_psk = Arc::new(
            Characteristic::new(
                paths.set_psk.clone(),
                uuid.with_role_digit(ROLE_SET_PSK),
                paths.service.clone(),
                CharacteristicFlags::WRITE,
            )
            .with_write_handler(writer(WriteTarget::Psk)),
        );

        let characteristics = [
            (command, "Command"),
            (status, "Status"),
            (ssid_list, "SSID List"),
            (set_ssid, "Set SSID"),
            (set_psk, "Set PSK"),
        ];

        let mut manager = ObjectManager::new(paths.root.clone());
        manager.add_object(Arc::clone(&service))?;
        for (chrc, description) in characteristics {
            let desc = Arc::new(Descriptor::user_description(chrc.path(), description)?);
            chrc.add_descriptor(desc.path().clone());
            service.add_characteristic(chrc.path().clone());
            manager.add_object(chrc)?;
            manager.add_object(desc)?;
        }

        let advertisement = Advertisement::new(paths.advertisement.clone(), &settings.local_name)
            .with_service_uuid(uuid)
            .with_appearance(settings.appearance);

        info!(
            "Built provisioning service {} with {} objects",
            uuid,
            manager.len()
        );

        Ok(Self {
            manager,
            controller,
            paths,
            advertisement,
        })
    }
}
