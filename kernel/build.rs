//! 进程调度内核构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Kernel.toml（或 build/.config）配置文件
//! 2. 生成 src/config.rs 中的常量

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// 解析 build/.config 文件（简单 section_key=value 格式）
fn parse_dot_config(content: &str) -> toml::Value {
    let mut sections: HashMap<String, HashMap<String, toml::Value>> = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // 跳过注释和空行
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = &line[..eq_pos];
            let value = line[eq_pos + 1..].trim();

            // 分割 section_key（使用第一个下划线分割）
            if let Some(underscore_pos) = key.find('_') {
                let section = &key[..underscore_pos];
                let config_key = &key[underscore_pos + 1..];

                let parsed_value = if value == "true" {
                    toml::Value::Boolean(true)
                } else if value == "false" {
                    toml::Value::Boolean(false)
                } else if let Ok(int_val) = value.parse::<i64>() {
                    toml::Value::Integer(int_val)
                } else {
                    toml::Value::String(value.to_string())
                };

                sections
                    .entry(section.to_string())
                    .or_insert_with(HashMap::new)
                    .insert(config_key.to_string(), parsed_value);
            }
        }
    }

    let mut root_map = toml::map::Map::new();
    for (section_name, section_data) in sections {
        let mut toml_map = toml::map::Map::new();
        for (k, v) in section_data {
            toml_map.insert(k, v);
        }
        root_map.insert(section_name, toml::Value::Table(toml_map));
    }

    toml::Value::Table(root_map)
}

/// 读取整数配置项，缺失时使用默认值
fn int_or(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn main() {
    println!("cargo:rerun-if-changed=../Kernel.toml");
    println!("cargo:rerun-if-changed=../build/.config");

    // 优先使用 build/.config（menuconfig 生成），否则回退到 Kernel.toml
    let config_content = if let Ok(content) = fs::read_to_string("../build/.config") {
        println!("cargo:warning=Using build/.config configuration");
        content
    } else {
        fs::read_to_string("../Kernel.toml").unwrap_or_default()
    };

    let is_toml = config_content.lines().any(|line| {
        let trimmed = line.trim();
        trimmed.starts_with('[') && trimmed.ends_with(']')
    });

    let config = if is_toml {
        toml::from_str(&config_content).expect("Kernel.toml 解析失败")
    } else {
        parse_dot_config(&config_content)
    };

    if let Some(name) = config.get("general").and_then(|g| g.get("name")).and_then(|v| v.as_str()) {
        println!("cargo:rustc-env=CARGO_KERNEL_NAME={}", name);
    }

    generate_config_code(&config);
}

fn generate_config_code(config: &toml::Value) {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());

    let config_source = format!(
        r#"//! 进程调度内核配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// SMP 配置
// ============================================================

/// 最大CPU数量
pub const MAX_CPUS: usize = {};

// ============================================================
// 进程表配置
// ============================================================

/// 进程表槽位数量
pub const NPROC: usize = {};

/// 每个进程可打开的文件数量
pub const NOFILE: usize = {};

/// 进程名长度（字节，含结尾 0）
pub const PROC_NAME_LEN: usize = {};

/// 每个进程可记录的不同系统调用数量
pub const MAX_SYSCALLS: usize = {};

/// 内核栈大小（字节）
pub const KSTACK_SIZE: usize = {};

/// 根进程 PID
pub const ROOT_PID: u32 = {};

/// shell 进程 PID
pub const SHELL_PID: u32 = {};

// ============================================================
// 调度器配置
// ============================================================

/// 老化阈值（RUNNABLE 等待的时钟滴答数）
pub const AGING_THRESHOLD: u32 = {};

/// SJF 默认预估运行时间
pub const DEFAULT_BURST_TIME: u32 = {};

/// SJF 默认置信度 (0-100)
pub const DEFAULT_CONFIDENCE: u32 = {};

/// SJF 随机数种子
pub const SCHED_RNG_SEED: u32 = {};

// ============================================================
// 内存配置
// ============================================================

/// 页大小
pub const PAGE_SIZE: usize = {};
"#,
        int_or(config, "smp", "max_cpus", 4) as usize,
        int_or(config, "process", "nproc", 64) as usize,
        int_or(config, "process", "nofile", 16) as usize,
        int_or(config, "process", "name_len", 16) as usize,
        int_or(config, "process", "max_syscalls", 64) as usize,
        int_or(config, "process", "kstack_size", 4096) as usize,
        int_or(config, "process", "root_pid", 1) as u32,
        int_or(config, "process", "shell_pid", 2) as u32,
        int_or(config, "scheduler", "aging_threshold", 800) as u32,
        int_or(config, "scheduler", "default_burst_time", 2) as u32,
        int_or(config, "scheduler", "default_confidence", 50) as u32,
        int_or(config, "scheduler", "rng_seed", 42) as u32,
        int_or(config, "memory", "page_size", 4096) as usize,
    );

    let config_file = manifest_dir.join("src").join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_source {
        fs::write(&config_file, &config_source).expect("写入配置文件失败");
    }
}
