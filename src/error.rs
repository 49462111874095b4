//! The closed fault/exception taxonomy of the architecture (spec §7).
//!
//! A [`Fault`] is raised by any fallible primitive (memory access, operand
//! decode, MMU walk, MAU broadcast). The step loop is the only place a
//! `Fault` is resolved into the [`Exception`] class that actually drives a
//! context switch; everything below that point just propagates with `?`.

use thiserror::Error;

/// Translation failures reported by the MMU (spec §4.2, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranslationFault {
    #[error("segment descriptor table overflow (SSL >= section length)")]
    SdtLength,
    #[error("segment not present")]
    SegmentNotPresent,
    #[error("page not present")]
    PageNotPresent,
    #[error("invalid segment descriptor")]
    InvalidSegmentDescriptor,
    #[error("indirect page descriptor chain too deep")]
    IndirectTooDeep,
    #[error("access denied for current execution level")]
    AccessDenied,
    #[error("segment offset out of range")]
    SegmentOffsetOutOfRange,
}

/// Everything that can cause an architected exception or a simulator stop.
///
/// This is the single fallible-result type threaded through memory access,
/// decode, and execution. `Machine::step` is the only consumer that turns a
/// `Fault` into context-switch bookkeeping; nothing else inspects it beyond
/// logging and `?`-propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    // --- Translation ---
    #[error("translation fault: {0}")]
    Translation(TranslationFault),
    #[error("access to unmapped memory")]
    UnmappedMemory,

    // --- Decode ---
    #[error("illegal opcode")]
    IllegalOpcode,
    #[error("reserved opcode")]
    ReservedOpcode,
    #[error("invalid operand descriptor")]
    InvalidDescriptor,
    #[error("reserved data type")]
    ReservedDataType,

    // --- Arithmetic / control ---
    #[error("integer divide by zero")]
    IntegerZeroDivide,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("external memory fault (unmasked MAU exception or foreign coprocessor id)")]
    ExternalMemoryFault,
    #[error("trace trap")]
    TraceTrap,
    #[error("breakpoint trap")]
    BreakpointTrap,

    // --- Privilege ---
    #[error("privileged opcode")]
    PrivilegedOpcode,
    #[error("privileged register")]
    PrivilegedRegister,
    #[error("illegal level change (CM < PM on return)")]
    IllegalLevelChange,
    #[error("invalid gate vector")]
    InvalidGateVector,

    // --- Stack ---
    #[error("stack bound violation")]
    StackBound,
    #[error("stack fault")]
    StackFault,
    #[error("interrupt-id fetch fault")]
    InterruptIdFetch,

    // --- Process / reset (PCB access during context switch) ---
    #[error("gate PCB fault")]
    GatePcbFault,
    #[error("old PCB fault")]
    OldPcbFault,
    #[error("new PCB fault")]
    NewPcbFault,
    #[error("system-data fault")]
    SystemDataFault,
    #[error("interrupt-stack fault")]
    InterruptStackFault,
    #[error("gate-vector fault")]
    GateVectorFault,
    #[error("external reset")]
    ExternalReset,
}

impl From<TranslationFault> for Fault {
    fn from(value: TranslationFault) -> Self {
        Fault::Translation(value)
    }
}

/// Exception Type field (PSW.ET), spec §3/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionType {
    Reset = 0,
    Process = 1,
    Stack = 2,
    Normal = 3,
}

/// Internal State Code assigned for a given fault, spec §6 "Exception ISCs".
///
/// Each `Fault` maps onto exactly one `(ExceptionType, isc)` pair; this is
/// the gate index the step loop uses to route through the two-level gate
/// tables (spec §4.1 "Normal Exception").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exception {
    pub kind: ExceptionType,
    pub isc: u8,
    pub fault: Fault,
}

impl Exception {
    pub fn from_fault(fault: Fault) -> Self {
        use ExceptionType::*;
        let (kind, isc) = match fault {
            Fault::IntegerZeroDivide => (Normal, 0),
            Fault::TraceTrap => (Normal, 1),
            Fault::IllegalOpcode => (Normal, 2),
            Fault::ReservedOpcode => (Normal, 3),
            Fault::InvalidDescriptor => (Normal, 4),
            Fault::ExternalMemoryFault => (Normal, 5),
            Fault::InvalidGateVector => (Normal, 6),
            Fault::IllegalLevelChange => (Normal, 7),
            Fault::ReservedDataType => (Normal, 8),
            Fault::IntegerOverflow => (Normal, 9),
            Fault::PrivilegedOpcode => (Normal, 10),
            Fault::BreakpointTrap => (Normal, 14),
            Fault::PrivilegedRegister => (Normal, 15),

            Fault::StackBound => (Stack, 0),
            Fault::StackFault => (Stack, 1),
            Fault::InterruptIdFetch => (Stack, 3),

            Fault::GatePcbFault => (Process, 1),

            Fault::OldPcbFault => (Reset, 0),
            Fault::SystemDataFault => (Reset, 1),
            Fault::InterruptStackFault => (Reset, 2),
            Fault::ExternalReset => (Reset, 3),
            Fault::NewPcbFault => (Reset, 4),
            Fault::GateVectorFault => (Reset, 6),

            // Translation/unmapped faults surface to the architected
            // handler as external memory faults unless the specific MMU
            // fault code needs finer ISC routing; the fault code register
            // (mmu::FaultCode) still records the precise translation
            // reason independently of the ISC used for delivery.
            Fault::Translation(_) | Fault::UnmappedMemory => (Normal, 5),
        };
        Exception { kind, isc, fault }
    }
}

/// Reasons the interpreter stops running `step()` in a loop, as opposed to
/// delivering an architected exception (spec §4.1 "Failure semantics",
/// §5 "Cancellation & timeouts").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StopReason {
    #[error("halted by HALT opcode")]
    Halted,
    #[error("exception nesting too deep")]
    ExceptionStackTooDeep,
    #[error("halt-on-exception debug switch tripped: {0}")]
    HaltOnException(Fault),
    #[error("breakpoint hit")]
    Breakpoint,
    #[error("step budget exhausted")]
    StepBudgetExhausted,
}
