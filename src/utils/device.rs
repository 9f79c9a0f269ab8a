use burn::backend::libtorch::LibTorchDevice;

/// Resolve the compute device once at startup, returning it along with the number of usable GPUs
pub fn initialize_device_settings(use_cuda: bool) -> (LibTorchDevice, usize) {
    if use_cuda && tch::Cuda::is_available() {
        let n_gpu = tch::Cuda::device_count() as usize;

        info!("Using CUDA device 0 ({} GPU(s) available)", n_gpu);

        (LibTorchDevice::Cuda(0), n_gpu)
    } else {
        if use_cuda {
            warn!("CUDA requested but not available, falling back to CPU");
        }

        info!("Using CPU");

        (LibTorchDevice::Cpu, 0)
    }
}

/// Seed the LibTorch random number generators
pub fn set_all_seeds(seed: u64) {
    tch::manual_seed(seed as i64);
}
