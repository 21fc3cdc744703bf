use hipremote_wire::body::{
    GetFunctionRequest, GetFunctionResponse, HandleValue, LaunchRequest, ModuleLoadRequest,
    ParamLayoutResponse,
};
use hipremote_wire::{Message, Status, WireBody};
use tracing::{debug, warn};

use super::request;
use crate::param_cache::slice_params;
use crate::runtime::LaunchGeometry;
use crate::session::{Handled, Reply, Session};

impl Session<'_> {
    /// `MODULE_LOAD_DATA*`: the code object arrives inline.
    pub(crate) fn module_load(&mut self, msg: &Message) -> Handled {
        let (req, image) = request::<ModuleLoadRequest>(msg)?;
        let size = usize::try_from(req.data_size).map_err(|_| Status::INVALID_VALUE)?;
        if image.len() < size {
            debug!(size, inline = image.len(), "code object short of data");
            return Err(Status::INVALID_VALUE);
        }
        let module = self.runtime.module_load(&image[..size])?;
        debug!(module, size, "module loaded");
        Ok(Reply::body(&HandleValue { value: module }))
    }

    pub(crate) fn module_unload(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.params.forget_module(req.value);
        self.runtime.module_unload(req.value)?;
        Ok(Reply::ok())
    }

    /// Resolves the function and reports how many parameters its layout has.
    pub(crate) fn module_get_function(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<GetFunctionRequest>(msg)?;
        let function = self.runtime.module_get_function(req.module, &req.name)?;
        self.params.register(req.module, function);
        let num_params = self
            .params
            .layout(&mut *self.runtime, function)
            .map_or(0, |layout| layout.len() as u32);
        debug!(function, name = %req.name, num_params, "function resolved");
        Ok(Reply::body(&GetFunctionResponse {
            function,
            num_params,
            reserved: 0,
        }))
    }

    /// `FUNCTION_GET_PARAM_LAYOUT`: count, then the slots inline.
    pub(crate) fn function_param_layout(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        let layout = self
            .params
            .layout(&mut *self.runtime, req.value)
            .ok_or(Status::NOT_SUPPORTED)?;
        let mut inline = Vec::with_capacity(layout.len() * 8);
        for slot in layout.iter() {
            inline.extend_from_slice(&slot.encode());
        }
        Ok(Reply::body(&ParamLayoutResponse {
            count: layout.len() as u32,
        })
        .with_inline(inline))
    }

    /// Launch with per-parameter ranges when the layout is known, flat otherwise.
    pub(crate) fn launch(&mut self, msg: &Message) -> Handled {
        let (req, args) = request::<LaunchRequest>(msg)?;
        let arg_size = req.arg_size as usize;
        if args.len() < arg_size {
            debug!(arg_size, inline = args.len(), "launch short of argument bytes");
            return Err(Status::INVALID_VALUE);
        }
        let args = &args[..arg_size];
        let geometry = LaunchGeometry {
            grid: [req.grid_x, req.grid_y, req.grid_z],
            block: [req.block_x, req.block_y, req.block_z],
            shared_mem_bytes: req.shared_mem_bytes,
            stream: req.stream,
        };

        match self.params.layout(&mut *self.runtime, req.function) {
            Some(layout) => {
                let params = slice_params(&layout, args).map_err(|err| {
                    warn!(function = req.function, error = %err, "kernel arguments do not match layout");
                    Status::INVALID_VALUE
                })?;
                self.runtime.launch(req.function, &geometry, &params)?;
            }
            None => self.runtime.launch_flat(req.function, &geometry, args)?,
        }
        Ok(Reply::ok())
    }
}

#[cfg(test)]
mod tests {
    use hipremote_wire::{KernelArgs, OpCode, ParamSlot};

    use super::*;
    use crate::handlers::test_message as message;
    use crate::runtime::{GpuRuntime, HostKernel, HostRuntime};
    use crate::param_cache::KernelParamCache;
    use crate::worker::WorkerStats;

    fn launch_request(function: u64, arg_size: usize) -> LaunchRequest {
        LaunchRequest {
            function,
            grid_x: 1,
            grid_y: 1,
            grid_z: 1,
            block_x: 1,
            block_y: 1,
            block_z: 1,
            shared_mem_bytes: 0,
            stream: 0,
            arg_size: arg_size as u32,
        }
    }

    /// `store(ptr, value)`: writes a u32 at `ptr`.
    fn store_kernel() -> HostKernel {
        HostKernel::new(|mem, _, params| {
            let ptr = u64::from_le_bytes(params[0].try_into().map_err(|_| Status::INVALID_VALUE)?);
            mem.write(ptr, params[1])
        })
        .with_layout(vec![ParamSlot::new(0, 8), ParamSlot::new(8, 4)])
    }

    fn loaded(runtime: &mut HostRuntime) -> u64 {
        runtime.register_kernel("store", store_kernel());
        runtime.module_load(b"\x7fELF").unwrap()
    }

    #[test]
    fn test_get_function_reports_param_count() {
        let mut runtime = HostRuntime::new();
        let module = loaded(&mut runtime);
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let req = GetFunctionRequest::new(module, "store").unwrap();
        let reply = session
            .module_get_function(&message(OpCode::ModuleGetFunction, &req, &[]))
            .unwrap();
        let (resp, _) = GetFunctionResponse::split(&reply.body).unwrap();
        assert_eq!(resp.num_params, 2);

        let missing = GetFunctionRequest::new(module, "nope").unwrap();
        let err = session
            .module_get_function(&message(OpCode::ModuleGetFunction, &missing, &[]))
            .unwrap_err();
        assert_eq!(err, Status::NOT_FOUND);
    }

    #[test]
    fn test_launch_slices_arguments_by_layout() {
        let mut runtime = HostRuntime::new();
        let module = loaded(&mut runtime);
        let function = runtime.module_get_function(module, "store").unwrap();
        let ptr = runtime.malloc(4).unwrap();
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let mut args = KernelArgs::new();
        args.push(hipremote_wire::DevicePtr(ptr)).push(0xfeed_beefu32);
        let msg = message(
            OpCode::ModuleLaunchKernel,
            &launch_request(function, args.len()),
            args.as_bytes(),
        );
        assert!(session.launch(&msg).unwrap().is_success());

        let mut out = [0u8; 4];
        session.runtime.memcpy_dtoh(&mut out, ptr, 0).unwrap();
        assert_eq!(u32::from_le_bytes(out), 0xfeed_beef);
    }

    #[test]
    fn test_launch_with_short_arguments_is_rejected() {
        let mut runtime = HostRuntime::new();
        let module = loaded(&mut runtime);
        let function = runtime.module_get_function(module, "store").unwrap();
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let args = [0u8; 8];
        let msg = message(OpCode::ModuleLaunchKernel, &launch_request(function, 8), &args);
        assert_eq!(session.launch(&msg).unwrap_err(), Status::INVALID_VALUE);

        let msg = message(OpCode::ModuleLaunchKernel, &launch_request(function, 16), &args);
        assert_eq!(session.launch(&msg).unwrap_err(), Status::INVALID_VALUE);
    }

    #[test]
    fn test_param_layout_query() {
        let mut runtime = HostRuntime::new();
        runtime.register_kernel("flat", HostKernel::new(|_, _, _| Ok(())));
        let module = loaded(&mut runtime);
        let store = runtime.module_get_function(module, "store").unwrap();
        let flat = runtime.module_get_function(module, "flat").unwrap();
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let reply = session
            .function_param_layout(&message(
                OpCode::FunctionGetParamLayout,
                &HandleValue { value: store },
                &[],
            ))
            .unwrap();
        let (resp, _) = ParamLayoutResponse::split(&reply.body).unwrap();
        assert_eq!(resp.count, 2);
        assert_eq!(reply.inline.len(), 16);
        let (first, rest) = ParamSlot::split(&reply.inline).unwrap();
        assert_eq!(first, ParamSlot::new(0, 8));
        assert_eq!(ParamSlot::split(rest).unwrap().0, ParamSlot::new(8, 4));

        let err = session
            .function_param_layout(&message(
                OpCode::FunctionGetParamLayout,
                &HandleValue { value: flat },
                &[],
            ))
            .unwrap_err();
        assert_eq!(err, Status::NOT_SUPPORTED);
    }

    #[test]
    fn test_unload_forgets_layouts() {
        let mut runtime = HostRuntime::new();
        let module = loaded(&mut runtime);
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let req = GetFunctionRequest::new(module, "store").unwrap();
        session
            .module_get_function(&message(OpCode::ModuleGetFunction, &req, &[]))
            .unwrap();
        assert_eq!(session.params.len(), 1);

        session
            .module_unload(&message(OpCode::ModuleUnload, &HandleValue { value: module }, &[]))
            .unwrap();
        assert!(session.params.is_empty());
    }

    #[test]
    fn test_layouts_outlive_the_session_that_resolved_them() {
        let mut runtime = HostRuntime::new();
        let module = loaded(&mut runtime);
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();

        {
            let mut first = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);
            let req = GetFunctionRequest::new(module, "store").unwrap();
            first
                .module_get_function(&message(OpCode::ModuleGetFunction, &req, &[]))
                .unwrap();
        }
        assert_eq!(params.len(), 1);

        let mut second = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);
        second
            .module_unload(&message(OpCode::ModuleUnload, &HandleValue { value: module }, &[]))
            .unwrap();
        drop(second);
        assert!(params.is_empty());
    }
}
