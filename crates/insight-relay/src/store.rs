// crates/insight-relay/src/store.rs
// Conversation state: the active thread, its tool-step trace and stream status.
//
// Every stream is tagged with the generation that was current when it
// started. `reset()` and `load_thread()` bump the generation and cancel the
// in-flight stream, so writes from a superseded stream are rejected even if
// they race the cancellation.

use std::sync::{Arc, Mutex, MutexGuard};

use insight_types::{ChatMessage, ThreadRecord, ThreadSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The conversation currently shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    /// Tools invoked during the current turn, in order
    pub tool_steps: Vec<String>,
    pub currently_streaming: bool,
    /// Terminal error of the last stream, if it failed
    pub error: Option<String>,
}

impl Thread {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            tool_steps: Vec::new(),
            currently_streaming: false,
            error: None,
        }
    }

    fn with_fresh_id() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            id: self.id.clone(),
            messages: self.messages.clone(),
            tool_steps: self.tool_steps.clone(),
            currently_streaming: self.currently_streaming,
            error: self.error.clone(),
        }
    }
}

impl From<ThreadRecord> for Thread {
    fn from(record: ThreadRecord) -> Self {
        Self {
            id: record.id,
            messages: record.messages,
            tool_steps: Vec::new(),
            currently_streaming: false,
            error: None,
        }
    }
}

/// Handed to a stream when it starts: its generation and its cancel handle
#[derive(Debug, Clone)]
pub struct StreamTicket {
    pub generation: u64,
    pub cancel: CancellationToken,
}

/// State container for the active conversation. Performs no I/O.
#[derive(Debug, Default)]
pub struct ConversationStore {
    thread: Option<Thread>,
    generation: u64,
    active_stream: Option<CancellationToken>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_ref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread.as_ref().map(|t| t.id.as_str())
    }

    pub fn snapshot(&self) -> Option<ThreadSnapshot> {
        self.thread.as_ref().map(Thread::snapshot)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn is_streaming(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| t.currently_streaming)
    }

    // ------------------------------------------------------------------
    // Thread lifecycle
    // ------------------------------------------------------------------

    /// Return the active thread, creating an empty one if there is none.
    pub fn ensure_thread(&mut self) -> &mut Thread {
        self.thread.get_or_insert_with(|| {
            let thread = Thread::with_fresh_id();
            info!(thread_id = %thread.id, "Created thread");
            thread
        })
    }

    /// Replace the active thread with one fetched from the thread store.
    pub fn load_thread(&mut self, record: ThreadRecord) {
        self.supersede();
        info!(thread_id = %record.id, messages = record.messages.len(), "Loaded thread");
        self.thread = Some(record.into());
    }

    /// Drop the active thread. Safe to call at any time, including mid-stream.
    pub fn reset(&mut self) {
        self.supersede();
        if let Some(thread) = self.thread.take() {
            debug!(thread_id = %thread.id, "Thread reset");
        }
    }

    fn supersede(&mut self) {
        if let Some(token) = self.active_stream.take() {
            token.cancel();
        }
        self.generation += 1;
    }

    // ------------------------------------------------------------------
    // Stream lifecycle
    // ------------------------------------------------------------------

    /// Start a new stream on the active thread.
    ///
    /// Clears the tool-step trace and any previous error. A stream that is
    /// still in flight is cancelled and superseded.
    pub fn begin_stream(&mut self) -> StreamTicket {
        if let Some(previous) = self.active_stream.take() {
            warn!(generation = self.generation, "Starting a stream while another is active");
            previous.cancel();
        }
        self.generation += 1;

        let thread = self.ensure_thread();
        thread.tool_steps.clear();
        thread.error = None;
        thread.currently_streaming = true;

        let cancel = CancellationToken::new();
        self.active_stream = Some(cancel.clone());
        StreamTicket {
            generation: self.generation,
            cancel,
        }
    }

    /// Start a user turn: supersede the previous stream, then append the
    /// user's message, so no stale reply can land after the question.
    pub fn begin_turn(&mut self, user_message: ChatMessage) -> StreamTicket {
        let ticket = self.begin_stream();
        self.append_message(user_message);
        ticket
    }

    /// Mark the stream of `generation` as done. Returns false if superseded.
    pub fn finish_stream(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.active_stream = None;
        if let Some(thread) = self.thread.as_mut() {
            thread.currently_streaming = false;
        }
        true
    }

    // ------------------------------------------------------------------
    // Mutations on behalf of the UI (always current generation)
    // ------------------------------------------------------------------

    pub fn append_message(&mut self, message: ChatMessage) {
        self.ensure_thread().messages.push(message);
    }

    pub fn record_tool_step(&mut self, name: impl Into<String>) {
        self.ensure_thread().tool_steps.push(name.into());
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        if let Some(thread) = self.thread.as_mut() {
            thread.currently_streaming = streaming;
        }
    }

    // ------------------------------------------------------------------
    // Mutations on behalf of a stream (checked against its generation)
    // ------------------------------------------------------------------

    fn live_thread(&mut self, generation: u64) -> Option<&mut Thread> {
        if !self.is_current(generation) {
            debug!(
                generation,
                current = self.generation,
                "Rejecting write from superseded stream"
            );
            return None;
        }
        self.thread.as_mut()
    }

    pub fn append_message_for(&mut self, generation: u64, message: ChatMessage) -> bool {
        match self.live_thread(generation) {
            Some(thread) => {
                thread.messages.push(message);
                true
            }
            None => false,
        }
    }

    pub fn record_tool_step_for(&mut self, generation: u64, name: impl Into<String>) -> bool {
        match self.live_thread(generation) {
            Some(thread) => {
                thread.tool_steps.push(name.into());
                true
            }
            None => false,
        }
    }

    /// Put the thread into its terminal error state for this stream.
    ///
    /// Only the first failure is kept.
    pub fn fail_stream(&mut self, generation: u64, message: impl Into<String>) -> bool {
        match self.live_thread(generation) {
            Some(thread) => {
                if thread.error.is_none() {
                    thread.error = Some(message.into());
                }
                thread.currently_streaming = false;
                true
            }
            None => false,
        }
    }
}

/// Cloneable handle to a store shared between the UI and stream tasks.
///
/// The lock is only held for a single synchronous mutation.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<ConversationStore>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ConversationStore> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a closure with exclusive access to the store
    pub fn with<R>(&self, f: impl FnOnce(&mut ConversationStore) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    pub fn snapshot(&self) -> Option<ThreadSnapshot> {
        self.lock().snapshot()
    }

    pub fn thread_id(&self) -> Option<String> {
        self.lock().thread_id().map(str::to_string)
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().is_streaming()
    }

    pub fn append_message(&self, message: ChatMessage) {
        self.lock().append_message(message);
    }

    pub fn record_tool_step(&self, name: impl Into<String>) {
        self.lock().record_tool_step(name);
    }

    pub fn set_streaming(&self, streaming: bool) {
        self.lock().set_streaming(streaming);
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn load_thread(&self, record: ThreadRecord) {
        self.lock().load_thread(record);
    }

    /// Start a stream and get a sink bound to its generation
    pub fn begin_stream(&self) -> (GenerationSink, CancellationToken) {
        let ticket = self.lock().begin_stream();
        self.bind(ticket)
    }

    /// Start a user turn under a single lock; see [`ConversationStore::begin_turn`]
    pub fn begin_turn(&self, user_message: ChatMessage) -> (GenerationSink, CancellationToken) {
        let ticket = self.lock().begin_turn(user_message);
        self.bind(ticket)
    }

    fn bind(&self, ticket: StreamTicket) -> (GenerationSink, CancellationToken) {
        let sink = GenerationSink {
            store: self.clone(),
            generation: ticket.generation,
        };
        (sink, ticket.cancel)
    }
}

/// Write access for one stream. Every write is dropped once the stream's
/// generation has been superseded.
#[derive(Debug, Clone)]
pub struct GenerationSink {
    store: SharedStore,
    generation: u64,
}

impl GenerationSink {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_live(&self) -> bool {
        self.store.lock().is_current(self.generation)
    }

    pub fn append(&self, message: ChatMessage) -> bool {
        self.store.lock().append_message_for(self.generation, message)
    }

    pub fn record_tool_step(&self, name: impl Into<String>) -> bool {
        self.store.lock().record_tool_step_for(self.generation, name)
    }

    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.store.lock().fail_stream(self.generation, message)
    }

    pub fn finish(&self) -> bool {
        self.store.lock().finish_stream(self.generation)
    }
}
