use core::fmt;

/// Register save area built by [`super::Arch::stack_init`] and consumed by
/// the first `context_switch` into a thread. Field order matches the
/// store/load sequence in `raw_context_switch`; reordering either without
/// the other corrupts every newly created thread.
#[repr(C)]
pub struct StackFrame {
    pub elr: u64,
    pub spsr: u64,
    pub xzr: u64,
    pub lr: u64,
    pub x28: u64,
    pub fp: u64,
    pub x26: u64,
    pub x27: u64,
    pub x24: u64,
    pub x25: u64,
    pub x22: u64,
    pub x23: u64,
    pub x20: u64,
    pub x21: u64,
    pub x18: u64,
    pub x19: u64,
    pub x16: u64,
    pub x17: u64,
    pub x14: u64,
    pub x15: u64,
    pub x12: u64,
    pub x13: u64,
    pub x10: u64,
    pub x11: u64,
    pub x8: u64,
    pub x9: u64,
    pub x6: u64,
    pub x7: u64,
    pub x4: u64,
    pub x5: u64,
    pub x2: u64,
    pub x3: u64,
    pub x0: u64,
    pub x1: u64,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "elr:  {:#018x}\n", self.elr)?;
        write!(f, "spsr: {:#018x}\n", self.spsr)?;
        write!(f, "lr:   {:#018x}\n", self.lr)?;
        write!(f, "x0:   {:#018x}\n", self.x0)?;
        write!(f, "x1:   {:#018x}\n", self.x1)
    }
}
