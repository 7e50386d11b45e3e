//! Fixed user-facing text.

use crate::error::TermsError;
use crate::types::Operation;

pub const GENERATE_LABEL: &str = "生成图谱";
pub const GENERATING_LABEL: &str = "生成中，点击中止";

pub const IDLE_HINT: &str = "点击节点查看详细信息，图谱可缩放及下载";
pub const FILTERED: &str = "抱歉，这不是我擅长的主题，问我点别的吧！";
pub const ABORTED: &str = "生成已中止";
pub const SEARCH_ABORTED: &str = "搜寻已中止";
pub const GENERATE_FAILED: &str = "生成失败，请重试";
pub const SEARCH_FAILED: &str = "没能找到图谱，请重试";
pub const ADD_CONCEPT_FAILED: &str = "新增节点失败，请重试";
pub const EMPTY_TOPIC: &str = "请输入主题";
pub const EMPTY_TOPIC_OR_COUNT: &str = "主题或概念数量不能为空";
pub const EMPTY_CONCEPT: &str = "请输入新概念/人物";
pub const EMPTY_GRAPH_ID: &str = "请输入图谱编号";
pub const NO_GRAPH_DATA: &str = "没有收到图谱数据";

pub const STARTING_GENERATE: &str = "正在生成新的图谱...";
pub const STARTING_REGENERATE: &str = "正在重新生成图谱...";
pub const STARTING_ADD_CONCEPT: &str = "正在新增概念";
pub const STARTING_SEARCH: &str = "正在搜寻图谱";
pub const LOADING_BY_ID: &str = "正在加载指定图谱...";

pub const DEFAULT_GRAPH_FAILED: &str = "默认图谱加载失败: ";
pub const LOAD_BY_ID_FAILED: &str = "加载图谱失败：";

/// Progress messages that get the animated trailing dots.
pub const LOADING_MESSAGES: &[&str] = &[
    "正在分析节点关系...\n节点太多的话可能需时几分钟",
    "正在初始化...\n接下来可能需要几分钟",
    "正在初始化新增节点流程",
    "正在生成新节点详细描述",
    "正在合并节点",
    "正在生成网络数据",
];

pub fn is_loading_message(message: &str) -> bool {
    LOADING_MESSAGES.contains(&message)
}

/// The info-box text shown when `op` ends with `err`.
pub fn failure_message(op: Operation, err: &TermsError) -> &'static str {
    match err {
        TermsError::ContentFiltered => FILTERED,
        TermsError::Aborted if op == Operation::Search => SEARCH_ABORTED,
        TermsError::Aborted => ABORTED,
        TermsError::EmptyInput(_) => EMPTY_TOPIC_OR_COUNT,
        _ => match op {
            Operation::Search => SEARCH_FAILED,
            Operation::AddConcept => ADD_CONCEPT_FAILED,
            Operation::Generate | Operation::Regenerate | Operation::Like => GENERATE_FAILED,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_messages_are_recognised() {
        assert!(is_loading_message("正在合并节点"));
        assert!(is_loading_message("正在初始化...\n接下来可能需要几分钟"));
        assert!(!is_loading_message("生成完成！"));
    }

    #[test]
    fn failure_messages_per_operation() {
        let net = TermsError::Network("down".into());
        assert_eq!(failure_message(Operation::Generate, &net), GENERATE_FAILED);
        assert_eq!(failure_message(Operation::Regenerate, &net), GENERATE_FAILED);
        assert_eq!(failure_message(Operation::Search, &net), SEARCH_FAILED);
        assert_eq!(failure_message(Operation::AddConcept, &net), ADD_CONCEPT_FAILED);
    }

    #[test]
    fn filtered_and_aborted_ignore_operation() {
        for op in [Operation::Generate, Operation::AddConcept, Operation::Search] {
            assert_eq!(failure_message(op, &TermsError::ContentFiltered), FILTERED);
        }
        assert_eq!(failure_message(Operation::Generate, &TermsError::Aborted), ABORTED);
        assert_eq!(failure_message(Operation::Search, &TermsError::Aborted), SEARCH_ABORTED);
    }
}
