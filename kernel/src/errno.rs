//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 标准错误代码定义
//!
//! 和 include/uapi/asm-generic/errno.h 保持一致，只保留进程表与调度器
//! 实际会返回的错误码

/// 标准错误代码
///
/// 内核内部操作返回 `Result<T, Errno>`，系统调用入口再转换为 xv6
/// 风格的返回值（失败统一为 -1）
///
/// 使用方法：
/// ```rust
/// use procsched::errno::Errno;
///
/// fn lookup(found: bool) -> Result<u32, Errno> {
///     if found { Ok(3) } else { Err(Errno::NoSuchProcess) }
/// }
/// assert_eq!(lookup(false), Err(Errno::NoSuchProcess));
/// ```
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// No such process (ESRCH, 3)
    NoSuchProcess = 3,

    /// Interrupted system call (EINTR, 4)
    InterruptedSystemCall = 4,

    /// No child process (ECHILD, 10)
    NoChild = 10,

    /// Try again (EAGAIN, 11)
    TryAgain = 11,

    /// Out of memory (ENOMEM, 12)
    OutOfMemory = 12,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,

    /// No data available (ENODATA, 61)
    NoData = 61,
}

impl Errno {
    /// 获取错误代码的正数值（用于比较）
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// 获取错误代码的负数值（用于系统调用返回）
    #[inline]
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Errno::NoSuchProcess => "no such process",
            Errno::InterruptedSystemCall => "interrupted system call",
            Errno::NoChild => "no child processes",
            Errno::TryAgain => "resource temporarily unavailable",
            Errno::OutOfMemory => "out of memory",
            Errno::InvalidArgument => "invalid argument",
            Errno::NoData => "no data available",
        };
        f.write_str(msg)
    }
}

/// 常用的错误代码常量
pub mod constants {
    pub const ESRCH: i32 = 3;
    pub const EINTR: i32 = 4;
    pub const ECHILD: i32 = 10;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EINVAL: i32 = 22;
    pub const ENODATA: i32 = 61;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(Errno::NoSuchProcess.as_i32(), constants::ESRCH);
        assert_eq!(Errno::NoChild.as_i32(), constants::ECHILD);
        assert_eq!(Errno::OutOfMemory.as_i32(), constants::ENOMEM);
        assert_eq!(Errno::InvalidArgument.as_i32(), constants::EINVAL);
    }

    #[test]
    fn test_errno_negative() {
        assert_eq!(Errno::NoSuchProcess.as_neg_i32(), -3);
        assert_eq!(Errno::TryAgain.as_neg_i32(), -11);
        assert_eq!(Errno::NoData.as_neg_i32(), -61);
    }
}
