/// Execution classes of the tasks that drive dependency managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Forwards a registry or configuration stream into one slot.
	EventPump,
	/// Periodically re-attempts failed pairs and refused activations.
	Retry,
	/// Waits for a component to become active within a deadline.
	Activation,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::EventPump => "event_pump",
			Self::Retry => "retry",
			Self::Activation => "activation",
		}
	}
}
