use thiserror::Error;

use crate::code_buffer::{page_size, DEFAULT_CODE_BUF_SIZE};
use crate::runtime::Runtime;
use crate::x86_64::regs::{FLOAT_ALLOC_ORDER, INT_ALLOC_ORDER, RESERVED_REGS, RESERVED_XMMS};
use crate::RegClass;

/// Smallest pool the generator can work with: binary ops may need
/// both operands and a destination live at once.
pub const MIN_POOL_SIZE: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0:?} allocation order is empty")]
    EmptyPool(RegClass),

    #[error("{class:?} allocation order has {found} registers, need at least {min}")]
    TooFewRegisters {
        class: RegClass,
        found: usize,
        min: usize,
    },

    #[error("register {reg} listed twice in the {class:?} allocation order")]
    DuplicateRegister { class: RegClass, reg: u8 },

    #[error("register number {reg} is not a host register")]
    InvalidRegister { reg: u8 },

    #[error("register {reg} is reserved and cannot be allocated as {class:?}")]
    ReservedRegister { class: RegClass, reg: u8 },

    #[error("code buffer of {size} bytes is smaller than one page")]
    BufferTooSmall { size: usize },
}

/// Back-end configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Integer registers handed out by the allocator, in preference order.
    pub int_alloc_order: Vec<u8>,
    /// Vector registers handed out by the allocator, in preference order.
    pub float_alloc_order: Vec<u8>,
    pub code_buffer_size: usize,
    /// Hooks called by compiled code.
    pub runtime: Runtime,
    /// Log every compiled block's IR at debug level.
    pub dump_ir: bool,
}

impl BackendConfig {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            int_alloc_order: INT_ALLOC_ORDER.iter().map(|&r| r as u8).collect(),
            float_alloc_order: FLOAT_ALLOC_ORDER.iter().map(|&r| r as u8).collect(),
            code_buffer_size: DEFAULT_CODE_BUF_SIZE,
            runtime,
            dump_ir: false,
        }
    }

    pub fn with_int_order(mut self, order: &[u8]) -> Self {
        self.int_alloc_order = order.to_vec();
        self
    }

    pub fn with_float_order(mut self, order: &[u8]) -> Self {
        self.float_alloc_order = order.to_vec();
        self
    }

    pub fn with_code_buffer_size(mut self, size: usize) -> Self {
        self.code_buffer_size = size;
        self
    }

    pub fn with_dump_ir(mut self, dump_ir: bool) -> Self {
        self.dump_ir = dump_ir;
        self
    }

    pub fn alloc_order(&self, class: RegClass) -> &[u8] {
        match class {
            RegClass::Int => &self.int_alloc_order,
            RegClass::Float => &self.float_alloc_order,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for class in [RegClass::Int, RegClass::Float] {
            let order = self.alloc_order(class);
            if order.is_empty() {
                return Err(ConfigError::EmptyPool(class));
            }
            if order.len() < MIN_POOL_SIZE {
                return Err(ConfigError::TooFewRegisters {
                    class,
                    found: order.len(),
                    min: MIN_POOL_SIZE,
                });
            }
            let reserved = match class {
                RegClass::Int => RESERVED_REGS,
                RegClass::Float => RESERVED_XMMS,
            };
            let mut seen = 0u16;
            for &reg in order {
                if reg >= 16 {
                    return Err(ConfigError::InvalidRegister { reg });
                }
                if reserved.contains(reg) {
                    return Err(ConfigError::ReservedRegister { class, reg });
                }
                if seen & (1 << reg) != 0 {
                    return Err(ConfigError::DuplicateRegister { class, reg });
                }
                seen |= 1 << reg;
            }
        }
        if self.code_buffer_size < page_size() {
            return Err(ConfigError::BufferTooSmall {
                size: self.code_buffer_size,
            });
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(Runtime::default())
    }
}
