//! CIO protocol: sysgen block, circular request/completion queues, job
//! records (spec §3, §4.5, §6 "CIO queue layout").
//!
//! Modeled as a CPU-facing memory-mapped interface only — no NI packet I/O,
//! no firmware pump (spec §1 Non-goal). [`CioCard`] abstracts "an
//! intelligent I/O card" enough for a test double to drive it without
//! implementing real Ethernet (SPEC_FULL.md §D "CIO protocol").

/// One 12-byte job record (spec §4.5 "Each job is a 12-byte record
/// (byte-count, subdevice, opcode, address, application-data)").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobRecord {
    pub byte_count: u16,
    pub subdevice: u8,
    pub opcode: u8,
    pub address: u32,
    pub application_data: u32,
}

impl JobRecord {
    pub fn decode(bytes: [u8; 12]) -> Self {
        JobRecord {
            byte_count: u16::from_be_bytes([bytes[0], bytes[1]]),
            subdevice: bytes[2],
            opcode: bytes[3],
            address: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            application_data: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    pub fn encode(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..2].copy_from_slice(&self.byte_count.to_be_bytes());
        out[2] = self.subdevice;
        out[3] = self.opcode;
        out[4..8].copy_from_slice(&self.address.to_be_bytes());
        out[8..12].copy_from_slice(&self.application_data.to_be_bytes());
        out
    }
}

/// The 12-byte sysgen block a card's address-window control-word write
/// prepares (spec §6 "CIO queue layout": "Sysgen block 12 bytes (request
/// queue pointer, completion queue pointer, queue sizes as bytes, interrupt
/// vector, number of request queues)").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SysgenBlock {
    pub request_queue_ptr: u32,
    pub completion_queue_ptr: u32,
    pub queue_size_bytes: u16,
    pub interrupt_vector: u16,
    pub request_queue_count: u8,
}

/// A queue's 4-byte head (spec §6: "a 4-byte head (load pointer, unload
/// pointer)") plus its `N` 12-byte entries.
#[derive(Debug, Clone)]
pub struct Queue {
    pub load_ptr: u16,
    pub unload_ptr: u16,
    pub entries: Vec<JobRecord>,
}

impl Queue {
    pub fn new(capacity: usize) -> Self {
        Queue { load_ptr: 0, unload_ptr: 0, entries: vec![JobRecord::default(); capacity] }
    }

    /// Appends a *full job* at the queue's load-pointer (spec §4.5: "A full
    /// job is appended at the queue's load-pointer").
    pub fn push_full(&mut self, job: JobRecord) {
        let cap = self.entries.len().max(1);
        self.entries[self.load_ptr as usize % cap] = job;
        self.load_ptr = (self.load_ptr + 1) % cap as u16;
    }

    /// Writes an *express job* directly to the first queue slot (spec
    /// §4.5: "an express job writes the first queue slot directly").
    pub fn push_express(&mut self, job: JobRecord) {
        if let Some(slot) = self.entries.get_mut(0) {
            *slot = job;
        }
    }

    pub fn pop(&mut self) -> Option<JobRecord> {
        if self.unload_ptr == self.load_ptr {
            return None;
        }
        let cap = self.entries.len().max(1);
        let job = self.entries[self.unload_ptr as usize % cap];
        self.unload_ptr = (self.unload_ptr + 1) % cap as u16;
        Some(job)
    }
}

/// Abstracts "an intelligent I/O card" just enough for a test double to
/// drive sysgen + job completion without implementing real Ethernet (spec
/// §1 Non-goal; SPEC_FULL.md §D).
pub trait CioCard {
    /// Handles a sysgen control-word write, returning the completion entry
    /// written to the well-known first slot (spec §4.5 "returns a
    /// completion entry at a well-known first slot").
    fn sysgen(&mut self, block: SysgenBlock) -> JobRecord;

    /// Services one pending job, producing its completion entry.
    fn service(&mut self, job: JobRecord) -> JobRecord;
}

const MAX_REQUEST_QUEUES: usize = 4;

/// One card slot's state: its negotiated sysgen parameters and queues
/// (spec §4.5, §6).
pub struct CardSlot {
    pub sysgen: SysgenBlock,
    pub request_queues: Vec<Queue>,
    pub completion_queue: Queue,
    pub express_entry: JobRecord,
}

impl CardSlot {
    fn new() -> Self {
        CardSlot {
            sysgen: SysgenBlock::default(),
            request_queues: Vec::new(),
            completion_queue: Queue::new(0),
            express_entry: JobRecord::default(),
        }
    }
}

impl Default for CardSlot {
    fn default() -> Self {
        Self::new()
    }
}

const SLOT_COUNT: usize = 12;

/// CPU-facing CIO state across all peripheral slots (spec §6 "Peripheral
/// slots map at predefined windows").
pub struct CioController {
    slots: [CardSlot; SLOT_COUNT],
}

impl CioController {
    pub fn new() -> Self {
        CioController { slots: std::array::from_fn(|_| CardSlot::new()) }
    }

    pub fn slot(&self, index: u8) -> &CardSlot {
        &self.slots[(index as usize) % SLOT_COUNT]
    }

    pub fn slot_mut(&mut self, index: u8) -> &mut CardSlot {
        &mut self.slots[(index as usize) % SLOT_COUNT]
    }

    /// Runs sysgen for `card` against `slot`, installing the negotiated
    /// queue sizes/count and returning the well-known completion entry.
    pub fn sysgen(&mut self, index: u8, block: SysgenBlock, card: &mut dyn CioCard) -> JobRecord {
        let completion = card.sysgen(block);
        let slot = self.slot_mut(index);
        slot.sysgen = block;
        let count = (block.request_queue_count as usize).min(MAX_REQUEST_QUEUES);
        slot.request_queues = (0..count).map(|_| Queue::new(block.queue_size_bytes as usize / 12)).collect();
        slot.completion_queue = Queue::new(block.queue_size_bytes as usize / 12);
        slot.completion_queue.push_express(completion);
        slot.express_entry = completion;
        completion
    }

    /// Submits a full job to `queue` on `slot`, then immediately services
    /// it and appends the completion entry (no asynchronous firmware pump
    /// is modeled — spec §1 Non-goal, SPEC_FULL.md §D).
    pub fn submit(&mut self, index: u8, queue: usize, job: JobRecord, card: &mut dyn CioCard) -> JobRecord {
        let completion = card.service(job);
        let slot = self.slot_mut(index);
        if let Some(q) = slot.request_queues.get_mut(queue) {
            q.push_full(job);
        }
        slot.completion_queue.push_full(completion);
        completion
    }

    pub fn ack_completion(&mut self, index: u8) -> Option<JobRecord> {
        self.slot_mut(index).completion_queue.pop()
    }
}

impl Default for CioController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoCard;
    impl CioCard for EchoCard {
        fn sysgen(&mut self, _block: SysgenBlock) -> JobRecord {
            JobRecord { opcode: 0xff, ..Default::default() }
        }
        fn service(&mut self, job: JobRecord) -> JobRecord {
            JobRecord { opcode: job.opcode, byte_count: job.byte_count, ..Default::default() }
        }
    }

    #[test]
    fn sysgen_installs_queues_and_returns_completion_at_first_slot() {
        let mut cio = CioController::new();
        let mut card = EchoCard;
        let block = SysgenBlock { request_queue_ptr: 0x1000, completion_queue_ptr: 0x2000, queue_size_bytes: 48, interrupt_vector: 0x60, request_queue_count: 1 };
        let completion = cio.sysgen(0, block, &mut card);
        assert_eq!(completion.opcode, 0xff);
        assert_eq!(cio.slot(0).request_queues.len(), 1);
    }

    #[test]
    fn submit_and_ack_round_trips_a_job() {
        let mut cio = CioController::new();
        let mut card = EchoCard;
        let block = SysgenBlock { request_queue_ptr: 0, completion_queue_ptr: 0, queue_size_bytes: 48, interrupt_vector: 0, request_queue_count: 1 };
        cio.sysgen(0, block, &mut card);
        let job = JobRecord { byte_count: 4, subdevice: 1, opcode: 7, address: 0x3000, application_data: 0 };
        cio.submit(0, 0, job, &mut card);
        let completion = cio.ack_completion(0).unwrap();
        assert_eq!(completion.opcode, 7);
        assert_eq!(completion.byte_count, 4);
    }

    #[test]
    fn job_record_round_trips_through_bytes() {
        let job = JobRecord { byte_count: 0x0102, subdevice: 3, opcode: 9, address: 0xdead_beef, application_data: 0x1234_5678 };
        assert_eq!(JobRecord::decode(job.encode()), job);
    }
}
