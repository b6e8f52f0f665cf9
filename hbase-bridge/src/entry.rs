//! Static method descriptors the bridge calls on the Java side.

/// JNI internal name of the Java bridge class.
pub const BRIDGE_CLASS: &str = "com/hbasegui/bridge/HBaseBridge";
/// Built-in class resolved after launch to prove the JVM is usable.
pub const STRING_CLASS: &str = "java/lang/String";
pub const SYSTEM_CLASS: &str = "java/lang/System";

/// What a static method hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    Void,
    Boolean,
    Object,
}

/// A (class, method, signature) triple naming a callable static method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub class: &'static str,
    pub name: &'static str,
    pub signature: &'static str,
    pub returns: Returns,
}

impl EntryPoint {
    const fn bridge(name: &'static str, signature: &'static str, returns: Returns) -> Self {
        Self {
            class: BRIDGE_CLASS,
            name,
            signature,
            returns,
        }
    }

    /// `Class.method` for log lines and errors.
    pub fn label(&self) -> String {
        let simple = self.class.rsplit('/').next().unwrap_or(self.class);
        format!("{simple}.{}", self.name)
    }
}

pub const CONNECT: EntryPoint = EntryPoint::bridge(
    "connect",
    "(Ljava/lang/String;Ljava/lang/String;)Z",
    Returns::Boolean,
);

pub const DISCONNECT: EntryPoint = EntryPoint::bridge("disconnect", "()V", Returns::Void);

pub const LIST_TABLES: EntryPoint =
    EntryPoint::bridge("listTables", "()Ljava/lang/String;", Returns::Object);

pub const GET_TABLE_DATA: EntryPoint = EntryPoint::bridge(
    "getTableData",
    "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;ILjava/lang/String;)Ljava/lang/String;",
    Returns::Object,
);

pub const EXECUTE_COMMAND: EntryPoint = EntryPoint::bridge(
    "executeCommand",
    "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;",
    Returns::Object,
);

pub const GET_PROPERTY: EntryPoint = EntryPoint {
    class: SYSTEM_CLASS,
    name: "getProperty",
    signature: "(Ljava/lang/String;)Ljava/lang/String;",
    returns: Returns::Object,
};

pub const SET_PROPERTY: EntryPoint = EntryPoint {
    class: SYSTEM_CLASS,
    name: "setProperty",
    signature: "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;",
    returns: Returns::Object,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        assert_eq!(CONNECT.label(), "HBaseBridge.connect");
        assert_eq!(GET_PROPERTY.label(), "System.getProperty");
    }

    #[test]
    fn test_signatures_match_returns() {
        for entry in [CONNECT, DISCONNECT, LIST_TABLES, GET_TABLE_DATA, EXECUTE_COMMAND] {
            let ret = entry.signature.rsplit(')').next().unwrap();
            let expected = match ret {
                "V" => Returns::Void,
                "Z" => Returns::Boolean,
                _ => Returns::Object,
            };
            assert_eq!(entry.returns, expected, "{}", entry.label());
        }
    }
}
