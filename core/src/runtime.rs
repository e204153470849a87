use crate::{Error, Result};
use rayon::ThreadPoolBuilder;
use std::env;
use std::sync::OnceLock;

static THREAD_POOL_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Initialize the global Rayon thread pool used by batch detection.
///
/// Priority:
/// 1. `num_threads` argument
/// 2. `MICROVISION_CPU_THREADS` environment variable
/// 3. Rayon default
///
/// Repeated calls return the outcome of the first one.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<()> {
    let res = THREAD_POOL_INIT.get_or_init(|| {
        let configured_threads = match num_threads {
            Some(n) => Some(n),
            None => read_cpu_threads_from_env()?,
        };

        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = configured_threads {
            if n == 0 {
                return Err("MICROVISION_CPU_THREADS must be >= 1".to_string());
            }
            builder = builder.num_threads(n);
        }

        builder.build_global().map_err(|e| e.to_string())
    });
    res.clone().map_err(Error::Configuration)
}

fn read_cpu_threads_from_env() -> std::result::Result<Option<usize>, String> {
    let raw = match env::var("MICROVISION_CPU_THREADS") {
        Ok(v) => v,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(e) => return Err(format!("failed to read MICROVISION_CPU_THREADS: {e}")),
    };

    let parsed: usize = raw
        .parse()
        .map_err(|_| format!("MICROVISION_CPU_THREADS must be a positive integer, got '{raw}'"))?;
    if parsed == 0 {
        return Err("MICROVISION_CPU_THREADS must be >= 1".to_string());
    }
    Ok(Some(parsed))
}

/// Allocates `len` default-initialised elements, reporting allocator failure
/// as [`Error::OutOfMemory`] instead of aborting.
pub fn try_alloc_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        Error::OutOfMemory(format!(
            "{} elements of {} bytes: {e}",
            len,
            std::mem::size_of::<T>()
        ))
    })?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Reserves room for `len` elements without initialising them.
pub fn try_alloc_capacity<T>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        Error::OutOfMemory(format!(
            "capacity for {} elements of {} bytes: {e}",
            len,
            std::mem::size_of::<T>()
        ))
    })?;
    Ok(buf)
}

/// Grows `buf` so that `additional` more pushes cannot reallocate.
pub fn try_reserve_additional<T>(buf: &mut Vec<T>, additional: usize) -> Result<()> {
    buf.try_reserve(additional).map_err(|e| {
        Error::OutOfMemory(format!(
            "{} more elements of {} bytes: {e}",
            additional,
            std::mem::size_of::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc_zeroed() {
        let buf: Vec<u32> = try_alloc_zeroed(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_try_alloc_reports_out_of_memory() {
        let res: Result<Vec<u64>> = try_alloc_zeroed(usize::MAX / 4);
        assert!(matches!(res, Err(Error::OutOfMemory(_))));
    }

    #[test]
    fn test_try_alloc_capacity_is_empty() {
        let buf: Vec<Vec<u32>> = try_alloc_capacity(8).unwrap();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 8);
    }

    #[test]
    fn test_try_reserve_additional() {
        let mut buf = vec![1u32, 2, 3];
        try_reserve_additional(&mut buf, 100).unwrap();
        let cap = buf.capacity();
        assert!(cap >= 103);
        buf.extend(0..100);
        assert_eq!(buf.capacity(), cap);

        assert!(matches!(
            try_reserve_additional(&mut buf, usize::MAX),
            Err(Error::OutOfMemory(_))
        ));
        assert_eq!(buf.len(), 103);
    }
}
