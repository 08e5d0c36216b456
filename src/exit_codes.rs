//! 命令行退出码

pub const SUCCESS: i32 = 0;
pub const DEFECTS_FOUND: i32 = 1; // 审计或检查发现硬性问题
pub const FATAL: i32 = 2; // 前置条件不满足或IO失败
