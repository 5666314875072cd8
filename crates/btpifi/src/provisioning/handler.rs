use super::controller::CommandController;
use crate::error::{GattError, GattResult};
use crate::gatt::WriteHandler;
use crate::wifi::WifiProvider;

/// Which controller entry point a characteristic write feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Command,
    Ssid,
    Psk,
}

/// Write handler forwarding characteristic writes to a [`CommandController`]
pub struct ControllerWriter<P> {
    controller: CommandController<P>,
    target: WriteTarget,
}

impl<P> ControllerWriter<P> {
    pub fn new(controller: CommandController<P>, target: WriteTarget) -> Self {
        Self { controller, target }
    }
}

impl<P: WifiProvider> WriteHandler for ControllerWriter<P> {
    fn handle_write(&self, data: &[u8]) -> GattResult<()> {
        match self.target {
            WriteTarget::Command => self.controller.handle_payload(data),
            WriteTarget::Ssid => self.controller.set_ssid(utf8(data, "SSID")?),
            WriteTarget::Psk => self.controller.set_psk(utf8(data, "PSK")?),
        }
    }
}

fn utf8<'a>(data: &'a [u8], what: &str) -> GattResult<&'a str> {
    std::str::from_utf8(data)
        .map_err(|_| GattError::InvalidValueLength(format!("{} must be valid UTF-8", what)))
}
