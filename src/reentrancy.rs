//! Debug-only detection of same-thread re-entry into a map.
//!
//! A thread that still holds a `ValueRef` into a map and then asks the same
//! map for write access would wait on its own read lock forever. The same
//! happens when a capability callback calls back into the map whose write
//! lock is already held. Debug builds record, per thread, which maps are
//! currently held and how, and panic on such a request before touching the
//! lock. Release builds compile all of this away.
//!
//! Read inside read is allowed: shared locks are taken recursively.

use core::marker::PhantomData;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Access {
    Read,
    Write,
}

#[cfg(debug_assertions)]
std::thread_local! {
    static HELD: core::cell::RefCell<Vec<(usize, Access)>> =
        const { core::cell::RefCell::new(Vec::new()) };
}

/// Marks one lock on map `id` as held by the current thread until dropped.
///
/// Not `Send`: the mark must be released on the thread that recorded it.
#[derive(Debug)]
pub(crate) struct HeldMark {
    #[cfg(debug_assertions)]
    id: usize,
    #[cfg(debug_assertions)]
    access: Access,
    _not_send: PhantomData<*const ()>,
}

#[cfg(debug_assertions)]
fn conflict(held: &[(usize, Access)], id: usize, access: Access) -> Option<&'static str> {
    let writing = held.iter().any(|&(h, a)| h == id && a == Access::Write);
    let holding = held.iter().any(|&(h, _)| h == id);
    match access {
        Access::Read if writing => {
            Some("map re-entered from inside one of its own write operations")
        }
        Access::Write if holding => {
            Some("map written while this thread still holds a lock on it (a live ValueRef?)")
        }
        _ => None,
    }
}

/// Record that the current thread is about to lock map `id`. In debug
/// builds, panics if that lock could never be granted.
#[inline]
pub(crate) fn enter(id: usize, access: Access) -> HeldMark {
    #[cfg(debug_assertions)]
    {
        let hit = HELD.with(|held| {
            let mut held = held.borrow_mut();
            let hit = conflict(&held, id, access);
            if hit.is_none() {
                held.push((id, access));
            }
            hit
        });
        if let Some(msg) = hit {
            panic!("reentrancy detected: {msg}");
        }
        return HeldMark {
            id,
            access,
            _not_send: PhantomData,
        };
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = (id, access);
        return HeldMark {
            _not_send: PhantomData,
        };
    }
}

impl Drop for HeldMark {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let _ = HELD.try_with(|held| {
                let mut held = held.borrow_mut();
                if let Some(pos) = held
                    .iter()
                    .rposition(|&(h, a)| h == self.id && a == self.access)
                {
                    held.remove(pos);
                }
            });
        }
    }
}
