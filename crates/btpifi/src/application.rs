//! GATT application lifecycle and method dispatch
//!
//! [`Application`] exports a built [`Peripheral`] on a [`Bus`], registers the
//! application and its advertisement with the host, routes incoming method
//! calls to the right object and tears everything down in reverse.

use crate::advertisement::LE_ADVERTISEMENT_IFACE;
use crate::error::{GattError, GattResult};
use crate::gatt::{Properties, PropertyBag, PropertyValue};
use crate::object_manager::{GattObject, ManagedObjects};
use crate::path::ObjectPath;
use crate::provisioning::Peripheral;
use crate::transport::{Bus, NotificationSink, TransportError, OBJECT_MANAGER_IFACE};
use crate::wifi::WifiProvider;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("GATT error: {0}")]
    Gatt(#[from] GattError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Application is already running")]
    AlreadyRunning,

    #[error("Application is not running")]
    NotRunning,
}

/// A method call addressed to one exported object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCall {
    ReadValue { offset: usize },
    WriteValue { offset: usize, value: Vec<u8> },
    StartNotify,
    StopNotify,
    Get { interface: String, name: String },
    GetAll { interface: String },
    Set { interface: String, name: String, value: PropertyValue },
    GetManagedObjects,
    Release,
}

impl MethodCall {
    /// Interface and member name, for logging and fault messages
    pub fn member(&self) -> (&'static str, &'static str) {
        match self {
            MethodCall::ReadValue { .. } => ("org.bluez.GattCharacteristic1", "ReadValue"),
            MethodCall::WriteValue { .. } => ("org.bluez.GattCharacteristic1", "WriteValue"),
            MethodCall::StartNotify => ("org.bluez.GattCharacteristic1", "StartNotify"),
            MethodCall::StopNotify => ("org.bluez.GattCharacteristic1", "StopNotify"),
            MethodCall::Get { .. } => (PROPERTIES_IFACE, "Get"),
            MethodCall::GetAll { .. } => (PROPERTIES_IFACE, "GetAll"),
            MethodCall::Set { .. } => (PROPERTIES_IFACE, "Set"),
            MethodCall::GetManagedObjects => (OBJECT_MANAGER_IFACE, "GetManagedObjects"),
            MethodCall::Release => (LE_ADVERTISEMENT_IFACE, "Release"),
        }
    }
}

/// Successful method-call result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Empty,
    Value(Vec<u8>),
    Property(PropertyValue),
    Properties(PropertyBag),
    ManagedObjects(ManagedObjects),
}

pub struct Application<B, P> {
    bus: Arc<B>,
    peripheral: Peripheral<P>,
    session: Option<Session>,
}

/// Bring-up steps that completed, so teardown undoes exactly those
#[derive(Debug, Default)]
struct Session {
    /// Root first, then objects in tree order
    exported: Vec<ObjectPath>,
    application_registered: bool,
    advertisement_exported: bool,
    advertisement_registered: bool,
}

impl<B, P> Application<B, P>
where
    B: Bus + 'static,
    P: WifiProvider,
{
    pub fn new(bus: Arc<B>, peripheral: Peripheral<P>) -> Self {
        Self {
            bus,
            peripheral,
            session: None,
        }
    }

    pub fn peripheral(&self) -> &Peripheral<P> {
        &self.peripheral
    }

    pub fn bus(&self) -> &Arc<B> {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Validate, export and register the application and its advertisement.
    ///
    /// On failure every step already taken is undone, so `start` can be
    /// retried.
    pub fn start(&mut self) -> Result<(), ApplicationError> {
        if self.session.is_some() {
            return Err(ApplicationError::AlreadyRunning);
        }
        let manager = &self.peripheral.manager;
        manager.validate()?;

        let sink: Arc<dyn NotificationSink> = self.bus.clone();
        manager.attach_sink(sink);

        let mut session = Session::default();
        if let Err(e) = self.bring_up(&mut session) {
            error!("Bring-up failed, rolling back: {}", e);
            // The bring-up error is the one worth reporting.
            let _ = self.tear_down(&session);
            return Err(e.into());
        }
        self.session = Some(session);

        info!(
            "Peripheral {:?} running at {}",
            self.peripheral.advertisement.local_name(),
            manager.root()
        );
        Ok(())
    }

    fn bring_up(&self, session: &mut Session) -> Result<(), TransportError> {
        let manager = &self.peripheral.manager;
        self.bus.export(manager.root(), OBJECT_MANAGER_IFACE)?;
        session.exported.push(manager.root().clone());
        for object in manager.objects() {
            self.bus.export(object.path(), object.interface())?;
            session.exported.push(object.path().clone());
        }
        self.bus
            .register_application(manager.root(), &manager.get_managed_objects())
            .inspect_err(|e| error!("Failed to register application: {}", e))?;
        session.application_registered = true;

        let advertisement = &self.peripheral.advertisement;
        self.bus.export(advertisement.path(), LE_ADVERTISEMENT_IFACE)?;
        session.advertisement_exported = true;
        self.bus
            .register_advertisement(advertisement.path(), &advertisement.properties())
            .inspect_err(|e| error!("Failed to register advertisement: {}", e))?;
        session.advertisement_registered = true;
        Ok(())
    }

    /// Unregister and unexport in reverse order.
    ///
    /// Every step is attempted; the first failure is returned.
    pub fn stop(&mut self) -> Result<(), ApplicationError> {
        let Some(session) = self.session.take() else {
            return Err(ApplicationError::NotRunning);
        };
        self.peripheral.controller.cancel();
        self.tear_down(&session)?;
        info!("Peripheral stopped");
        Ok(())
    }

    fn tear_down(&self, session: &Session) -> Result<(), TransportError> {
        let manager = &self.peripheral.manager;
        let advertisement = &self.peripheral.advertisement;
        let mut first_error: Option<TransportError> = None;
        let mut note = |result: Result<(), TransportError>| {
            if let Err(e) = result {
                warn!("Teardown step failed: {}", e);
                first_error.get_or_insert(e);
            }
        };

        if session.advertisement_registered {
            note(self.bus.unregister_advertisement(advertisement.path()));
            advertisement.release();
        }
        if session.advertisement_exported {
            note(self.bus.unexport(advertisement.path()));
        }
        if session.application_registered {
            note(self.bus.unregister_application(manager.root()));
        }
        for path in session.exported.iter().rev() {
            note(self.bus.unexport(path));
        }
        manager.detach_sink();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Route a method call to the object at `path`
    pub fn dispatch(&self, path: &ObjectPath, call: MethodCall) -> GattResult<Reply> {
        let (interface, member) = call.member();
        debug!("{} {}.{}", path, interface, member);

        let manager = &self.peripheral.manager;
        if path == manager.root() {
            return match call {
                MethodCall::GetManagedObjects => {
                    Ok(Reply::ManagedObjects(manager.get_managed_objects()))
                }
                _ => Err(unknown_method(interface, member)),
            };
        }

        let advertisement = &self.peripheral.advertisement;
        if path == advertisement.path() {
            return match call {
                MethodCall::Release => {
                    advertisement.release();
                    Ok(Reply::Empty)
                }
                call => properties_call(advertisement, call),
            };
        }

        let object = manager.get(path)?;
        let result = match (object, call) {
            (GattObject::Characteristic(c), MethodCall::ReadValue { offset }) => {
                c.read_value(offset).map(Reply::Value)
            }
            (GattObject::Characteristic(c), MethodCall::WriteValue { offset, value }) => {
                c.write_value(offset, &value).map(|()| Reply::Empty)
            }
            (GattObject::Characteristic(c), MethodCall::StartNotify) => {
                c.start_notify().map(|()| Reply::Empty)
            }
            (GattObject::Characteristic(c), MethodCall::StopNotify) => {
                c.stop_notify().map(|()| Reply::Empty)
            }
            (GattObject::Descriptor(d), MethodCall::ReadValue { offset }) => {
                d.read_value(offset).map(Reply::Value)
            }
            (GattObject::Descriptor(d), MethodCall::WriteValue { offset, value }) => {
                d.write_value(offset, &value).map(|()| Reply::Empty)
            }
            (object, call) => properties_call(object.as_properties(), call),
        };
        result.inspect_err(|e| debug!("{} {}.{} failed: {}", path, interface, member, e))
    }
}

fn properties_call<T: Properties + ?Sized>(target: &T, call: MethodCall) -> GattResult<Reply> {
    let (interface, member) = call.member();
    match call {
        MethodCall::Get { interface, name } => {
            target.get_property(&interface, &name).map(Reply::Property)
        }
        MethodCall::GetAll { interface } => {
            target.get_all_properties(&interface).map(Reply::Properties)
        }
        MethodCall::Set {
            interface,
            name,
            value,
        } => target
            .set_property(&interface, &name, value)
            .map(|()| Reply::Empty),
        _ => Err(unknown_method(interface, member)),
    }
}

fn unknown_method(interface: &str, method: &str) -> GattError {
    GattError::UnknownMethod {
        interface: interface.to_string(),
        method: method.to_string(),
    }
}
