//! Lazily created auth transport scoped to the logical calls that use it.

// self
use crate::{_prelude::*, auth::AuthRequest, http::AuthTransport};

/// Factory used by a session to build its own auth transport on demand.
pub type AuthTransportFactory = Arc<dyn Fn() -> Result<Arc<dyn AuthTransport>> + Send + Sync>;

/// Where a session gets the transport handed to credentials.
pub(crate) enum AuthTransportSlot {
	/// Caller-owned transport; never released by the session.
	Supplied(Arc<dyn AuthTransport>),
	/// Session-owned transport built by `factory` and dropped once no call is using it.
	Lazy { factory: AuthTransportFactory, state: Mutex<LazyState> },
}
impl AuthTransportSlot {
	pub(crate) fn lazy(factory: AuthTransportFactory) -> Self {
		Self::Lazy { factory, state: Mutex::new(LazyState::default()) }
	}

	/// Borrows the transport for one logical call, building it first when needed.
	///
	/// The returned lease releases a session-owned transport when the last concurrent call that
	/// uses it ends, on every exit path.
	pub(crate) fn lease(&self) -> Result<AuthTransportLease<'_>> {
		let transport = match self {
			Self::Supplied(transport) => Arc::clone(transport),
			Self::Lazy { factory, state } => {
				let mut state = state.lock();
				let transport = match &state.transport {
					Some(transport) => Arc::clone(transport),
					None => {
						let transport = factory()?;

						state.transport = Some(Arc::clone(&transport));

						transport
					},
				};

				state.leases += 1;

				transport
			},
		};

		Ok(AuthTransportLease { slot: self, transport })
	}

	/// Returns `true` while a session-owned transport is alive.
	pub(crate) fn is_active(&self) -> bool {
		match self {
			Self::Supplied(_) => true,
			Self::Lazy { state, .. } => state.lock().transport.is_some(),
		}
	}

	fn release(&self) {
		if let Self::Lazy { state, .. } = self {
			let mut state = state.lock();

			state.leases = state.leases.saturating_sub(1);

			if state.leases == 0 {
				state.transport = None;
			}
		}
	}
}
impl Debug for AuthTransportSlot {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Supplied(_) => f.write_str("AuthTransportSlot::Supplied(..)"),
			Self::Lazy { state, .. } => f
				.debug_struct("AuthTransportSlot::Lazy")
				.field("active", &state.lock().transport.is_some())
				.finish(),
		}
	}
}

#[derive(Default)]
pub(crate) struct LazyState {
	transport: Option<Arc<dyn AuthTransport>>,
	leases: usize,
}

/// Auth transport borrowed for the duration of one logical call.
pub(crate) struct AuthTransportLease<'a> {
	slot: &'a AuthTransportSlot,
	transport: Arc<dyn AuthTransport>,
}
impl AuthTransportLease<'_> {
	/// Derives the invoker handed to credentials, binding the caller's timeout when set.
	pub(crate) fn auth_request(&self, timeout: Option<Duration>) -> AuthRequest {
		let auth = AuthRequest::new(Arc::clone(&self.transport));

		match timeout {
			Some(timeout) => auth.with_timeout(timeout),
			None => auth,
		}
	}
}
impl Drop for AuthTransportLease<'_> {
	fn drop(&mut self) {
		self.slot.release();
	}
}
