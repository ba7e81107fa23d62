use crate::error::FunnelError;
use lazy_static::lazy_static;

/// One registered segment type: its ordered labels, the display color
/// for each label, and the funnel stage list it iterates.
///
/// The catalog is the single source of truth for iteration order. The
/// ratio computer and the chart builder both walk `labels` in the order
/// given here, which keeps stacked-bar segment order consistent with
/// the legend.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub name: &'static str,
    pub labels: &'static [&'static str],
    /// Hex colors, parallel to `labels`.
    pub colors: &'static [&'static str],
    pub stages: &'static [&'static str],
}

impl SegmentSpec {
    /// Display color for a label of this segment type.
    ///
    /// Labels always come out of `labels`, so the fallback gray is only
    /// reachable from callers that pass a label from somewhere else.
    pub fn color_of(&self, label: &str) -> &'static str {
        self.labels
            .iter()
            .position(|l| *l == label)
            .map(|i| self.colors[i])
            .unwrap_or(DEFAULT_COLOR)
    }
}

/// Standard 7-stage funnel.
pub const FUNNEL_STAGES: &[&str] = &[
    "回答数",
    "特典受取",
    "コンサル申込",
    "コンサル日程調整済",
    "コンサル実施",
    "紹介",
    "成約",
];

/// 8-stage variant with the pre-funnel friend-count stage prepended.
/// Used by 全体 and ユーザー属性, the two types whose columns derive
/// from the 新規/既存 families.
pub const USER_TYPE_FUNNEL_STAGES: &[&str] = &[
    "友だち数",
    "回答数",
    "特典受取",
    "コンサル申込",
    "コンサル日程調整済",
    "コンサル実施",
    "紹介",
    "成約",
];

const DEFAULT_COLOR: &str = "#7f7f7f";

lazy_static! {
    /// The segment catalog, in UI presentation order. Built once at
    /// process start and never mutated; safe to share across threads
    /// without locking.
    static ref CATALOG: Vec<SegmentSpec> = vec![
        SegmentSpec {
            name: "全体",
            labels: &["全体"],
            colors: &["#2ecc71"],
            stages: USER_TYPE_FUNNEL_STAGES,
        },
        SegmentSpec {
            name: "ユーザー属性",
            labels: &["新規", "既存"],
            colors: &["#3498db", "#e74c3c"],
            stages: USER_TYPE_FUNNEL_STAGES,
        },
        SegmentSpec {
            name: "職業別",
            labels: &["会社員", "フリーランス"],
            colors: &["#1f77b4", "#ff7f0e"],
            stages: FUNNEL_STAGES,
        },
        SegmentSpec {
            name: "経験年数別",
            labels: &["未経験", "1年未満", "1年~2年", "2年~3年", "3年~4年", "4年以上"],
            colors: &["#377eb8", "#ff7f00", "#4daf4a", "#e41a1c", "#984ea3", "#f781bf"],
            stages: FUNNEL_STAGES,
        },
        SegmentSpec {
            name: "収入帯別",
            labels: &[
                "20万円以下",
                "20万円~40万円",
                "40万円~60万円",
                "60万円~80万円",
                "80万円~100万円",
                "100万円以上",
            ],
            colors: &["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#f781bf"],
            stages: FUNNEL_STAGES,
        },
    ];
}

/// Registered segment type names in presentation order.
pub fn segment_types() -> Vec<&'static str> {
    CATALOG.iter().map(|s| s.name).collect()
}

/// Full spec for a segment type.
///
/// # Errors
/// * `UnknownSegmentType` if the name is not registered.
pub fn spec_for(segment_type: &str) -> Result<&'static SegmentSpec, FunnelError> {
    CATALOG
        .iter()
        .find(|s| s.name == segment_type)
        .ok_or_else(|| FunnelError::UnknownSegmentType(segment_type.to_string()))
}

/// Ordered segment labels for a segment type.
pub fn labels_for(segment_type: &str) -> Result<&'static [&'static str], FunnelError> {
    Ok(spec_for(segment_type)?.labels)
}

/// Ordered funnel stages for a segment type.
pub fn stages_for(segment_type: &str) -> Result<&'static [&'static str], FunnelError> {
    Ok(spec_for(segment_type)?.stages)
}

/// Display color for one label of a segment type.
pub fn color_for(segment_type: &str, label: &str) -> Result<&'static str, FunnelError> {
    Ok(spec_for(segment_type)?.color_of(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_types_in_presentation_order() {
        assert_eq!(
            segment_types(),
            vec!["全体", "ユーザー属性", "職業別", "経験年数別", "収入帯別"]
        );
    }

    #[test]
    fn labels_and_colors_stay_parallel() {
        for name in segment_types() {
            let spec = spec_for(name).unwrap();
            assert_eq!(spec.labels.len(), spec.colors.len(), "{name}");
            assert!(!spec.labels.is_empty());
            assert!(spec.labels.len() <= 6);
        }
    }

    #[test]
    fn user_derived_types_get_the_pre_funnel_stage() {
        assert_eq!(stages_for("全体").unwrap().len(), 8);
        assert_eq!(stages_for("ユーザー属性").unwrap().len(), 8);
        assert_eq!(stages_for("ユーザー属性").unwrap()[0], "友だち数");
        assert_eq!(stages_for("職業別").unwrap().len(), 7);
        assert_eq!(stages_for("職業別").unwrap()[0], "回答数");
    }

    #[test]
    fn unknown_segment_type_is_rejected() {
        let err = spec_for("地域別").unwrap_err();
        assert_eq!(err, FunnelError::UnknownSegmentType("地域別".to_string()));
        assert!(labels_for("地域別").is_err());
        assert!(stages_for("地域別").is_err());
        assert!(color_for("地域別", "全体").is_err());
    }

    #[test]
    fn color_lookup_matches_label_position() {
        assert_eq!(color_for("ユーザー属性", "新規").unwrap(), "#3498db");
        assert_eq!(color_for("ユーザー属性", "既存").unwrap(), "#e74c3c");
        assert_eq!(color_for("経験年数別", "4年以上").unwrap(), "#f781bf");
    }
}
