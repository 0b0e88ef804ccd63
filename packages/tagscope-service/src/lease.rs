use std::sync::Arc;

use tokio::runtime::Handle;

use tagscope_storage::{LockService, LockToken};

/// Prefix of every tag scope lease key.
pub const LOCK_KEY_PREFIX: &str = "TagScope_";

pub fn lock_key(scope: &tagscope_domain::NodeRef) -> String {
	format!("{LOCK_KEY_PREFIX}{scope}")
}

/// Holds an acquired lease until [`LeaseGuard::release`] or drop.
///
/// Dropping without releasing hands the release to the current runtime. Outside a runtime the
/// lease is left to expire.
pub struct LeaseGuard {
	locks: Arc<dyn LockService>,
	token: Option<LockToken>,
}
impl LeaseGuard {
	pub fn new(locks: Arc<dyn LockService>, token: LockToken) -> Self {
		Self { locks, token: Some(token) }
	}

	pub async fn release(mut self) {
		let Some(token) = self.token.take() else {
			return;
		};

		release_logged(self.locks.as_ref(), &token).await;
	}
}
impl Drop for LeaseGuard {
	fn drop(&mut self) {
		let Some(token) = self.token.take() else {
			return;
		};

		match Handle::try_current() {
			Ok(handle) => {
				let locks = self.locks.clone();

				handle.spawn(async move {
					release_logged(locks.as_ref(), &token).await;
				});
			},
			Err(_) => {
				tracing::warn!(key = %token.key, "No runtime to release lease; it will expire.");
			},
		}
	}
}

async fn release_logged(locks: &dyn LockService, token: &LockToken) {
	match locks.release(token).await {
		Ok(true) => {},
		Ok(false) => {
			tracing::warn!(key = %token.key, "Lease expired before release.");
		},
		Err(err) => {
			tracing::warn!(key = %token.key, error = %err, "Failed to release lease.");
		},
	}
}
