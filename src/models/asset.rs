//! 静态谱面资源注册表
//!
//! 谱面是预先制作好的静态版式资源，运行时只能引用、不能生成。
//! 注册表是固定的编译期映射，未注册的名称由校验器报错。

use phf::phf_map;
use serde::Serialize;

/// 谱面资源枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffAsset {
    /// 整行五线谱
    SingleStaff,
    /// 短五线谱
    ShortStaff,
    /// 钢琴大谱表
    GrandStaff,
}

/// 谱面指令值 → 资源的映射，中英文名称都可用
static STAFF_REGISTRY: phf::Map<&'static str, StaffAsset> = phf_map! {
    "五线谱" => StaffAsset::SingleStaff,
    "single" => StaffAsset::SingleStaff,
    "短谱" => StaffAsset::ShortStaff,
    "short" => StaffAsset::ShortStaff,
    "钢琴谱" => StaffAsset::GrandStaff,
    "grand" => StaffAsset::GrandStaff,
    "piano" => StaffAsset::GrandStaff,
};

impl StaffAsset {
    /// 按指令值查找资源，大小写不敏感
    pub fn lookup(name: &str) -> Option<StaffAsset> {
        let normalized = name.trim().to_lowercase();
        STAFF_REGISTRY.get(normalized.as_str()).copied()
    }

    /// 渲染时使用的 LaTeX 命令（由模板 styles.sty 定义）
    pub fn latex_command(&self) -> &'static str {
        match self {
            StaffAsset::SingleStaff => r"\staffsingle",
            StaffAsset::ShortStaff => r"\staffshort",
            StaffAsset::GrandStaff => r"\staffgrand",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(StaffAsset::lookup("五线谱"), Some(StaffAsset::SingleStaff));
        assert_eq!(StaffAsset::lookup("short"), Some(StaffAsset::ShortStaff));
        assert_eq!(StaffAsset::lookup("钢琴谱"), Some(StaffAsset::GrandStaff));
        assert_eq!(StaffAsset::lookup("  Piano "), Some(StaffAsset::GrandStaff));
    }

    #[test]
    fn test_lookup_unknown_name() {
        assert_eq!(StaffAsset::lookup("吉他谱"), None);
        assert_eq!(StaffAsset::lookup(""), None);
    }
}
