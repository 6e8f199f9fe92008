// Class-file format ceilings

// Largest declared constant-pool count (entries + 1)
pub const MAX_POOL_COUNT: usize = 65535;
// Field, method and interface counts must stay below this
pub const MAX_MEMBER_COUNT: usize = 65535;
// Identifiers must encode to fewer bytes than this
pub const MAX_IDENTIFIER_BYTES: usize = 65535;
// Parameter slots, including `this`, with long and double taking two
pub const MAX_PARAMETER_SLOTS: usize = 255;
pub const MAX_CODE_LENGTH: usize = 65535;

// Well-known binary names
pub const ROOT_CLASS: &str = "java/lang/Object";
pub const STRING_CLASS: &str = "java/lang/String";
pub const THROWABLE_CLASS: &str = "java/lang/Throwable";
pub const EXCEPTION_CLASS: &str = "java/lang/Exception";

// Package searched last when resolving simple type names
pub const IMPLICIT_PACKAGE: &[&str] = &["java", "lang"];

// Synthetic field holding the enclosing instance of an inner class
pub const OUTER_THIS_FIELD: &str = "this$0";

pub const ENTRY_POINT_NAME: &str = "main";
