use crate::error::{Result, WireError};

macro_rules! op_codes {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// Every operation the protocol forwards.
        #[repr(u16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpCode {
            $($variant = $code,)*
        }

        impl OpCode {
            /// All op codes in declaration order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$variant,)*];

            /// Name of the API call this op forwards.
            pub fn name(self) -> &'static str {
                match self {
                    $(OpCode::$variant => $name,)*
                }
            }
        }

        impl TryFrom<u16> for OpCode {
            type Error = WireError;

            fn try_from(code: u16) -> Result<Self> {
                match code {
                    $($code => Ok(OpCode::$variant),)*
                    other => Err(WireError::UnknownOpCode(other)),
                }
            }
        }
    };
}

op_codes! {
    Init = 0x0001 => "init",
    Shutdown = 0x0002 => "shutdown",
    Ping = 0x0003 => "ping",

    GetDeviceCount = 0x0100 => "hipGetDeviceCount",
    SetDevice = 0x0101 => "hipSetDevice",
    GetDevice = 0x0102 => "hipGetDevice",
    GetDeviceProperties = 0x0103 => "hipGetDeviceProperties",
    DeviceSynchronize = 0x0104 => "hipDeviceSynchronize",
    DeviceReset = 0x0105 => "hipDeviceReset",
    DeviceGetAttribute = 0x0106 => "hipDeviceGetAttribute",

    Malloc = 0x0200 => "hipMalloc",
    Free = 0x0201 => "hipFree",
    MallocHost = 0x0202 => "hipHostMalloc",
    FreeHost = 0x0203 => "hipHostFree",
    MallocManaged = 0x0204 => "hipMallocManaged",
    MallocAsync = 0x0205 => "hipMallocAsync",
    FreeAsync = 0x0206 => "hipFreeAsync",

    Memcpy = 0x0210 => "hipMemcpy",
    MemcpyAsync = 0x0211 => "hipMemcpyAsync",
    Memcpy2D = 0x0212 => "hipMemcpy2D",
    Memcpy2DAsync = 0x0213 => "hipMemcpy2DAsync",
    Memcpy3D = 0x0214 => "hipMemcpy3D",
    Memcpy3DAsync = 0x0215 => "hipMemcpy3DAsync",
    MemcpyDtoD = 0x0216 => "hipMemcpyDtoD",
    MemcpyDtoDAsync = 0x0217 => "hipMemcpyDtoDAsync",
    MemcpyHtoD = 0x0218 => "hipMemcpyHtoD",
    MemcpyHtoDAsync = 0x0219 => "hipMemcpyHtoDAsync",
    MemcpyDtoH = 0x021A => "hipMemcpyDtoH",
    MemcpyDtoHAsync = 0x021B => "hipMemcpyDtoHAsync",

    Memset = 0x0220 => "hipMemset",
    MemsetAsync = 0x0221 => "hipMemsetAsync",
    MemsetD8 = 0x0222 => "hipMemsetD8",
    MemsetD16 = 0x0223 => "hipMemsetD16",
    MemsetD32 = 0x0224 => "hipMemsetD32",

    MemGetInfo = 0x0230 => "hipMemGetInfo",
    PointerGetAttributes = 0x0231 => "hipPointerGetAttributes",

    StreamCreate = 0x0300 => "hipStreamCreate",
    StreamCreateWithFlags = 0x0301 => "hipStreamCreateWithFlags",
    StreamCreateWithPriority = 0x0302 => "hipStreamCreateWithPriority",
    StreamDestroy = 0x0303 => "hipStreamDestroy",
    StreamSynchronize = 0x0304 => "hipStreamSynchronize",
    StreamQuery = 0x0305 => "hipStreamQuery",
    StreamWaitEvent = 0x0306 => "hipStreamWaitEvent",
    StreamGetFlags = 0x0307 => "hipStreamGetFlags",
    StreamGetPriority = 0x0308 => "hipStreamGetPriority",

    EventCreate = 0x0400 => "hipEventCreate",
    EventCreateWithFlags = 0x0401 => "hipEventCreateWithFlags",
    EventDestroy = 0x0402 => "hipEventDestroy",
    EventRecord = 0x0403 => "hipEventRecord",
    EventSynchronize = 0x0404 => "hipEventSynchronize",
    EventQuery = 0x0405 => "hipEventQuery",
    EventElapsedTime = 0x0406 => "hipEventElapsedTime",

    ModuleLoadData = 0x0500 => "hipModuleLoadData",
    ModuleLoadDataEx = 0x0501 => "hipModuleLoadDataEx",
    ModuleUnload = 0x0502 => "hipModuleUnload",
    ModuleGetFunction = 0x0503 => "hipModuleGetFunction",
    ModuleGetGlobal = 0x0504 => "hipModuleGetGlobal",

    LaunchKernel = 0x0510 => "hipLaunchKernel",
    LaunchCooperativeKernel = 0x0511 => "hipLaunchCooperativeKernel",
    ModuleLaunchKernel = 0x0512 => "hipModuleLaunchKernel",
    FunctionGetParamLayout = 0x0513 => "hipKernelGetParamInfo",

    GetLastError = 0x0600 => "hipGetLastError",
    PeekAtLastError = 0x0601 => "hipPeekAtLastError",
    GetErrorString = 0x0602 => "hipGetErrorString",
    GetErrorName = 0x0603 => "hipGetErrorName",

    RuntimeGetVersion = 0x0700 => "hipRuntimeGetVersion",
    DriverGetVersion = 0x0701 => "hipDriverGetVersion",

    SmiInit = 0x0800 => "amdsmi_init",
    SmiShutdown = 0x0801 => "amdsmi_shut_down",
    SmiGetProcessorCount = 0x0802 => "amdsmi_get_processor_handles",
    SmiGetGpuMetrics = 0x0820 => "amdsmi_get_gpu_metrics_info",
    SmiGetPowerInfo = 0x0821 => "amdsmi_get_power_info",
    SmiGetClockInfo = 0x0822 => "amdsmi_get_clock_info",
    SmiGetTempMetric = 0x0823 => "amdsmi_get_temp_metric",
    SmiGetGpuActivity = 0x0824 => "amdsmi_get_gpu_activity",
    SmiGetVramUsage = 0x0825 => "amdsmi_get_gpu_vram_usage",
    SmiGetAsicInfo = 0x0830 => "amdsmi_get_gpu_asic_info",
}

impl OpCode {
    /// Raw wire value.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Telemetry ops occupy the disjoint 0x08xx range.
    pub const fn is_telemetry(self) -> bool {
        (self as u16) & 0xFF00 == 0x0800
    }

    /// Ops that may be sent with `NO_REPLY`.
    ///
    /// These are asynchronous in the native API and return nothing the
    /// caller could observe. Everything else must be answered.
    pub const fn accepts_no_reply(self) -> bool {
        matches!(
            self,
            OpCode::Free
                | OpCode::FreeAsync
                | OpCode::Memcpy
                | OpCode::MemcpyAsync
                | OpCode::MemcpyDtoD
                | OpCode::MemcpyDtoDAsync
                | OpCode::MemcpyHtoD
                | OpCode::MemcpyHtoDAsync
                | OpCode::Memset
                | OpCode::MemsetAsync
                | OpCode::MemsetD8
                | OpCode::MemsetD16
                | OpCode::MemsetD32
                | OpCode::EventRecord
                | OpCode::LaunchKernel
                | OpCode::LaunchCooperativeKernel
                | OpCode::ModuleLaunchKernel
        )
    }

    /// Ops that report errors deferred from earlier `NO_REPLY` requests.
    pub const fn is_sync_point(self) -> bool {
        matches!(
            self,
            OpCode::DeviceSynchronize
                | OpCode::StreamSynchronize
                | OpCode::EventSynchronize
                | OpCode::Memcpy
                | OpCode::MemcpyDtoH
                | OpCode::GetLastError
                | OpCode::PeekAtLastError
        )
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.code())
    }
}
