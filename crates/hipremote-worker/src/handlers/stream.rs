use hipremote_wire::body::{
    ElapsedTimeRequest, ElapsedTimeResponse, EventCreateRequest, EventRecordRequest,
    HandleValue, StreamCreateRequest, StreamWaitEventRequest,
};
use hipremote_wire::Message;

use super::request;
use crate::session::{Handled, Reply, Session};

impl Session<'_> {
    pub(crate) fn stream_create(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<StreamCreateRequest>(msg)?;
        let stream = self.runtime.stream_create(req.flags, req.priority)?;
        Ok(Reply::body(&HandleValue { value: stream }))
    }

    pub(crate) fn stream_destroy(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.runtime.stream_destroy(req.value)?;
        Ok(Reply::ok())
    }

    pub(crate) fn stream_synchronize(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.runtime.stream_synchronize(req.value)?;
        Ok(Reply::ok())
    }

    pub(crate) fn stream_query(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.runtime.stream_query(req.value)?;
        Ok(Reply::ok())
    }

    pub(crate) fn stream_wait_event(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<StreamWaitEventRequest>(msg)?;
        self.runtime.stream_wait_event(req.stream, req.event, req.flags)?;
        Ok(Reply::ok())
    }

    pub(crate) fn event_create(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<EventCreateRequest>(msg)?;
        let event = self.runtime.event_create(req.flags)?;
        Ok(Reply::body(&HandleValue { value: event }))
    }

    pub(crate) fn event_destroy(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.runtime.event_destroy(req.value)?;
        Ok(Reply::ok())
    }

    pub(crate) fn event_record(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<EventRecordRequest>(msg)?;
        self.runtime.event_record(req.event, req.stream)?;
        Ok(Reply::ok())
    }

    pub(crate) fn event_synchronize(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.runtime.event_synchronize(req.value)?;
        Ok(Reply::ok())
    }

    pub(crate) fn event_query(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.runtime.event_query(req.value)?;
        Ok(Reply::ok())
    }

    pub(crate) fn event_elapsed_time(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<ElapsedTimeRequest>(msg)?;
        let milliseconds = self.runtime.event_elapsed_time(req.start, req.end)?;
        Ok(Reply::body(&ElapsedTimeResponse { milliseconds }))
    }
}
