//! Numeric diagnostic codes, numbered like libxml2's `xmlParserErrors`.
//!
//! Codes are only unique within their domain.

// Parser domain.
pub const ERR_INTERNAL: i32 = 1;
pub const ERR_DOCUMENT_EMPTY: i32 = 4;
pub const ERR_DOCUMENT_END: i32 = 5;
pub const ERR_INVALID_CHARREF: i32 = 8;
pub const ERR_INVALID_CHAR: i32 = 9;
pub const ERR_ENTITYREF_SEMICOL_MISSING: i32 = 23;
pub const ERR_UNDECLARED_ENTITY: i32 = 26;
pub const ERR_UNSUPPORTED_ENCODING: i32 = 32;
pub const ERR_LT_IN_ATTRIBUTE: i32 = 38;
pub const ERR_ATTRIBUTE_NOT_STARTED: i32 = 39;
pub const ERR_ATTRIBUTE_NOT_FINISHED: i32 = 40;
pub const ERR_ATTRIBUTE_WITHOUT_VALUE: i32 = 41;
pub const ERR_ATTRIBUTE_REDEFINED: i32 = 42;
pub const ERR_LITERAL_NOT_FINISHED: i32 = 43;
pub const ERR_COMMENT_NOT_FINISHED: i32 = 45;
pub const ERR_PI_NOT_FINISHED: i32 = 47;
pub const ERR_XMLDECL_NOT_FINISHED: i32 = 57;
pub const ERR_DOCTYPE_NOT_FINISHED: i32 = 61;
pub const ERR_MISPLACED_CDATA_END: i32 = 62;
pub const ERR_CDATA_NOT_FINISHED: i32 = 63;
pub const ERR_RESERVED_XML_NAME: i32 = 64;
pub const ERR_SPACE_REQUIRED: i32 = 65;
pub const ERR_NAME_REQUIRED: i32 = 68;
pub const ERR_GT_REQUIRED: i32 = 73;
pub const ERR_TAG_NAME_MISMATCH: i32 = 76;
pub const ERR_TAG_NOT_FINISHED: i32 = 77;
pub const ERR_HYPHEN_IN_COMMENT: i32 = 80;
pub const ERR_INVALID_ENCODING: i32 = 81;
pub const ERR_EXTRA_CONTENT: i32 = 86;
pub const ERR_ENTITY_LOOP: i32 = 89;
pub const ERR_VERSION_MISSING: i32 = 96;
/// A parser resource limit (nesting depth, entity amplification) was hit.
pub const ERR_DEPTH_EXCEEDED: i32 = 111;

// Namespace domain.
pub const NS_ERR_UNDEFINED_NAMESPACE: i32 = 201;
pub const NS_ERR_QNAME: i32 = 202;

// HTML domain.
pub const HTML_STRUCTURE_ERROR: i32 = 800;
pub const HTML_UNKNOWN_TAG: i32 = 801;

// XPath domain.
pub const XPATH_NUMBER_ERROR: i32 = 1201;
pub const XPATH_UNFINISHED_LITERAL: i32 = 1202;
pub const XPATH_START_LITERAL: i32 = 1203;
pub const XPATH_UNDEF_VARIABLE: i32 = 1205;
pub const XPATH_INVALID_PREDICATE: i32 = 1206;
pub const XPATH_EXPR_ERROR: i32 = 1207;
pub const XPATH_UNCLOSED: i32 = 1208;
pub const XPATH_UNKNOWN_FUNC: i32 = 1209;
pub const XPATH_INVALID_OPERAND: i32 = 1210;
pub const XPATH_INVALID_TYPE: i32 = 1211;
pub const XPATH_INVALID_ARITY: i32 = 1212;
pub const XPATH_UNDEF_PREFIX: i32 = 1219;
pub const XPATH_INVALID_CTXT: i32 = 1222;

// Tree domain.
pub const TREE_RELEASED_NODE: i32 = 1310;
pub const TREE_HIERARCHY: i32 = 1311;
pub const TREE_WRONG_KIND: i32 = 1312;
pub const TREE_NO_PARENT: i32 = 1313;
pub const TREE_SECOND_ROOT: i32 = 1314;

// Output domain.
pub const SAVE_UNKNOWN_ENCODING: i32 = 1403;
pub const SAVE_RELEASED: i32 = 1404;

// I/O domain.
pub const IO_WRITE: i32 = 1546;
pub const IO_LOAD_ERROR: i32 = 1549;
