//! Per-thread record of the most recent failure at the C boundary.

use std::cell::RefCell;

use hbase_bridge::BridgeError;

use crate::error::FfiErrorKind;

thread_local! {
    static LAST_ERROR: RefCell<Option<(FfiErrorKind, String)>> = const { RefCell::new(None) };
}

pub fn clear() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}

pub fn set(kind: FfiErrorKind, message: String) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some((kind, message)));
}

pub fn record(err: &BridgeError) {
    set(FfiErrorKind::from(err), err.to_string());
}

pub fn kind() -> FfiErrorKind {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(FfiErrorKind::Ok, |(kind, _)| *kind)
    })
}

pub fn message() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map(|(_, message)| message.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_clear() {
        clear();
        assert_eq!(kind(), FfiErrorKind::Ok);
        record(&BridgeError::NotConnected);
        assert_eq!(kind(), FfiErrorKind::Invocation);
        assert_eq!(message().as_deref(), Some("not connected to HBase"));
        clear();
        assert_eq!(message(), None);
    }

    #[test]
    fn test_thread_local() {
        record(&BridgeError::NotInitialized);
        let other = std::thread::spawn(kind).join().unwrap();
        assert_eq!(other, FfiErrorKind::Ok);
    }
}
