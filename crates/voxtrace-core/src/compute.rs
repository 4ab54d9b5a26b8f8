//! Compute context selection
//!
//! Exactly one context is bound at a time. The bound context is a guard that
//! returns its handle to the engine when dropped, so replacing or releasing the
//! context can never leak a native handle.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{ContextHandle, TransportEngine};
use crate::error::{SimError, SimResult};

/// Allocation snapshot of the bound context
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReport {
    pub context_index: u32,
    pub device_name: String,
    pub allocated_bytes: u64,
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "context {} ({}): {:.3} MiB allocated",
            self.context_index,
            self.device_name,
            self.allocated_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}

/// A bound context; the handle is released when this is dropped
struct BoundContext {
    engine: Arc<dyn TransportEngine>,
    handle: ContextHandle,
    index: u32,
    device_name: String,
}

impl Drop for BoundContext {
    fn drop(&mut self) {
        log::debug!("Releasing compute context {} ({})", self.index, self.device_name);
        self.engine.release_context(self.handle);
    }
}

enum ContextState {
    Unselected,
    Active(BoundContext),
    Released,
}

pub struct ComputeContext {
    engine: Arc<dyn TransportEngine>,
    state: ContextState,
}

impl ComputeContext {
    pub fn new(engine: Arc<dyn TransportEngine>) -> Self {
        Self {
            engine,
            state: ContextState::Unselected,
        }
    }

    fn check_released(&self) -> SimResult<()> {
        match self.state {
            ContextState::Released => Err(SimError::ContextReleased),
            _ => Ok(()),
        }
    }

    fn bound(&self) -> SimResult<&BoundContext> {
        match &self.state {
            ContextState::Active(bound) => Ok(bound),
            ContextState::Released => Err(SimError::ContextReleased),
            ContextState::Unselected => Err(SimError::NoContext),
        }
    }

    /// Names of every device the engine exposes
    pub fn devices(&self) -> SimResult<Vec<String>> {
        self.check_released()?;
        Ok((0..self.engine.device_count())
            .map(|i| {
                self.engine
                    .device_name(i)
                    .unwrap_or_else(|| format!("device {i}"))
            })
            .collect())
    }

    /// Bind the device at `index`, releasing any previously bound context first
    pub fn select_context(&mut self, index: u32) -> SimResult<()> {
        let available = self.engine.device_count();
        if index >= available {
            return Err(SimError::InvalidContextIndex { index, available });
        }

        // Drop the old guard before acquiring the new handle
        self.state = ContextState::Unselected;

        let handle = self.engine.acquire_context(index)?;
        let device_name = self
            .engine
            .device_name(index)
            .unwrap_or_else(|| format!("device {index}"));
        log::info!("Selected compute context {index}: {device_name}");
        self.state = ContextState::Active(BoundContext {
            engine: Arc::clone(&self.engine),
            handle,
            index,
            device_name,
        });
        Ok(())
    }

    pub fn is_selected(&self) -> bool {
        matches!(self.state, ContextState::Active(_))
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, ContextState::Released)
    }

    pub fn index(&self) -> SimResult<u32> {
        Ok(self.bound()?.index)
    }

    pub fn device_name(&self) -> SimResult<&str> {
        Ok(&self.bound()?.device_name)
    }

    pub fn handle(&self) -> SimResult<ContextHandle> {
        Ok(self.bound()?.handle)
    }

    /// Current allocation snapshot; does not change any state
    pub fn report_memory_usage(&self) -> SimResult<MemoryReport> {
        let bound = self.bound()?;
        let allocated_bytes = self.engine.allocated_bytes(bound.handle)?;
        Ok(MemoryReport {
            context_index: bound.index,
            device_name: bound.device_name.clone(),
            allocated_bytes,
        })
    }

    /// Release the bound context; calling it again has no further effect
    pub fn release(&mut self) {
        if !self.is_released() {
            self.state = ContextState::Released;
            log::info!("Compute context released");
        }
    }

    pub fn engine(&self) -> &Arc<dyn TransportEngine> {
        &self.engine
    }

    pub(crate) fn print_infos(&self) {
        match &self.state {
            ContextState::Active(bound) => {
                log::info!("Compute context");
                log::info!("  index: {}", bound.index);
                log::info!("  device: {}", bound.device_name);
                log::info!("  devices available: {}", self.engine.device_count());
            }
            ContextState::Unselected => log::info!("Compute context: none selected"),
            ContextState::Released => log::info!("Compute context: released"),
        }
    }
}

impl fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            ContextState::Unselected => "unselected".to_string(),
            ContextState::Active(bound) => format!("active({})", bound.index),
            ContextState::Released => "released".to_string(),
        };
        f.debug_struct("ComputeContext").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_engine::CpuReferenceEngine;

    fn context(devices: u32) -> (Arc<CpuReferenceEngine>, ComputeContext) {
        let engine = Arc::new(CpuReferenceEngine::new(devices));
        let ctx = ComputeContext::new(engine.clone());
        (engine, ctx)
    }

    #[test]
    fn test_select_out_of_range() {
        let (_, mut ctx) = context(2);
        assert!(matches!(
            ctx.select_context(2),
            Err(SimError::InvalidContextIndex {
                index: 2,
                available: 2
            })
        ));
        assert!(!ctx.is_selected());
    }

    #[test]
    fn test_reselect_releases_previous_handle() {
        let (engine, mut ctx) = context(2);
        ctx.select_context(0).unwrap();
        let first = ctx.handle().unwrap();
        ctx.select_context(1).unwrap();

        assert_ne!(ctx.handle().unwrap(), first);
        assert_eq!(ctx.index().unwrap(), 1);
        assert_eq!(engine.live_contexts(), 1);
    }

    #[test]
    fn test_memory_report_is_read_only() {
        let (_, mut ctx) = context(1);
        ctx.select_context(0).unwrap();
        let a = ctx.report_memory_usage().unwrap();
        let b = ctx.report_memory_usage().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.context_index, 0);
    }

    #[test]
    fn test_release_is_idempotent_and_blocks_use() {
        let (engine, mut ctx) = context(1);
        ctx.select_context(0).unwrap();
        ctx.release();
        ctx.release();
        assert_eq!(engine.live_contexts(), 0);

        assert!(matches!(ctx.report_memory_usage(), Err(SimError::ContextReleased)));
        assert!(matches!(ctx.handle(), Err(SimError::ContextReleased)));
        assert!(matches!(ctx.devices(), Err(SimError::ContextReleased)));

        ctx.select_context(0).unwrap();
        assert!(ctx.report_memory_usage().is_ok());
    }

    #[test]
    fn test_drop_releases_handle() {
        let (engine, mut ctx) = context(1);
        ctx.select_context(0).unwrap();
        assert_eq!(engine.live_contexts(), 1);
        drop(ctx);
        assert_eq!(engine.live_contexts(), 0);
    }

    #[test]
    fn test_unselected_context() {
        let (_, ctx) = context(1);
        assert!(matches!(ctx.report_memory_usage(), Err(SimError::NoContext)));
        assert_eq!(ctx.devices().unwrap().len(), 1);
    }
}
