use hipremote_wire::body::{DeviceAttributeRequest, DeviceRequest, IntValue};
use hipremote_wire::Message;
use tracing::debug;

use super::request;
use crate::session::{Handled, Reply, Session};

impl Session<'_> {
    /// Select the configured device and start from a clean deferred slot.
    pub(crate) fn init(&mut self) -> Handled {
        self.runtime.set_device(self.device)?;
        self.clear_deferred();
        debug!(device = self.device, runtime = self.runtime.name(), "session initialized");
        Ok(Reply::ok())
    }

    pub(crate) fn get_device_count(&mut self) -> Handled {
        let value = self.runtime.device_count()?;
        Ok(Reply::body(&IntValue { value }))
    }

    pub(crate) fn set_device(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<DeviceRequest>(msg)?;
        self.runtime.set_device(req.device)?;
        Ok(Reply::ok())
    }

    pub(crate) fn get_device(&mut self) -> Handled {
        let value = self.runtime.device()?;
        Ok(Reply::body(&IntValue { value }))
    }

    pub(crate) fn get_device_properties(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<DeviceRequest>(msg)?;
        let props = self.runtime.device_properties(req.device)?;
        Ok(Reply::body(&props))
    }

    pub(crate) fn device_get_attribute(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<DeviceAttributeRequest>(msg)?;
        let value = self.runtime.device_attribute(req.attribute, req.device)?;
        Ok(Reply::body(&IntValue { value }))
    }

    pub(crate) fn device_synchronize(&mut self) -> Handled {
        self.runtime.device_synchronize()?;
        Ok(Reply::ok())
    }

    /// Resetting the device invalidates every function handle.
    pub(crate) fn device_reset(&mut self) -> Handled {
        self.params.clear();
        self.runtime.device_reset()?;
        Ok(Reply::ok())
    }

    pub(crate) fn runtime_version(&mut self) -> Handled {
        let value = self.runtime.runtime_version()?;
        Ok(Reply::body(&IntValue { value }))
    }

    pub(crate) fn driver_version(&mut self) -> Handled {
        let value = self.runtime.driver_version()?;
        Ok(Reply::body(&IntValue { value }))
    }
}
