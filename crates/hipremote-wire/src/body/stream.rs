wire_body! {
    /// `STREAM_CREATE*`.
    pub struct StreamCreateRequest {
        pub flags: u32,
        pub priority: i32,
    }
}

wire_body! {
    /// `STREAM_WAIT_EVENT`.
    pub struct StreamWaitEventRequest {
        pub stream: u64,
        pub event: u64,
        pub flags: u32,
    }
}

wire_body! {
    /// `EVENT_CREATE*`.
    pub struct EventCreateRequest {
        pub flags: u32,
    }
}

wire_body! {
    /// `EVENT_RECORD`.
    pub struct EventRecordRequest {
        pub event: u64,
        pub stream: u64,
    }
}

wire_body! {
    /// `EVENT_ELAPSED_TIME`.
    pub struct ElapsedTimeRequest {
        pub start: u64,
        pub end: u64,
    }
}

wire_body! {
    /// `EVENT_ELAPSED_TIME` response, in milliseconds.
    pub struct ElapsedTimeResponse {
        pub milliseconds: f32,
    }
}
