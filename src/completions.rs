//! Editor completion logic, kept free of any host API.
//!
//! Three providers: sobject field completions after a `.` on a typed
//! variable, Visualforce tag snippets after a `<`, and a cross-view word
//! merge that widens word completion beyond the current buffer. The host
//! hands in plain text and gets back `(label, insertion)` pairs.

use crate::stores::FieldMap;
use regex::Regex;
use std::collections::HashMap;

/// One completion entry: what the picker shows and what gets inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    pub insert: String,
}

impl Completion {
    fn new(label: impl Into<String>, insert: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            insert: insert.into(),
        }
    }
}

// Bounds on the cross-view word merge so large sessions stay responsive.
pub const MIN_WORD_SIZE: usize = 3;
pub const MAX_WORD_SIZE: usize = 30;
pub const MAX_VIEWS: usize = 20;
pub const MAX_WORDS_PER_VIEW: usize = 100;

/// Find the declared type of `variable` in Apex source by locating a
/// `Type variable ;` or `Type variable =` declaration. The first match wins.
pub fn declared_type(source: &str, variable: &str) -> Option<String> {
    let pattern = format!(r"(\w+)\s+{}\s*[;=]", regex::escape(variable));
    let re = Regex::new(&pattern).ok()?;
    re.captures(source)
        .map(|captures| captures[1].to_string())
}

/// Field completions for `variable.` in Apex source. `org` is the persisted
/// sobject map of the current username; `None` means the org was never
/// initiated or the variable's type is unknown.
///
/// Lookup tries the declared type verbatim, then lowercased-and-capitalized
/// so `account acc;` still finds `Account`.
pub fn sobject_field_completions(
    org: &HashMap<String, FieldMap>,
    source: &str,
    variable: &str,
) -> Option<Vec<Completion>> {
    let sobject = declared_type(source, variable)?;
    let fields = org.get(&sobject).or_else(|| {
        let mut capitalized = sobject.to_lowercase();
        if let Some(first) = capitalized.get(0..1) {
            let upper = first.to_uppercase();
            capitalized.replace_range(0..1, &upper);
        }
        org.get(&capitalized)
    })?;

    let mut completions: Vec<Completion> = fields
        .iter()
        .map(|(label, name)| Completion::new(format!("{}.{}", sobject, label), name.clone()))
        .collect();
    completions.sort_by(|a, b| a.label.cmp(&b.label));
    Some(completions)
}

/// Visualforce tag snippets, offered right after an opening `<`.
/// `$1`-style placeholders follow snippet tab-stop conventions.
pub fn page_completions(preceding_char: char) -> Vec<Completion> {
    if preceding_char != '<' {
        return Vec::new();
    }
    VISUALFORCE_TAGS
        .iter()
        .map(|(tag, snippet)| Completion::new(*tag, *snippet))
        .collect()
}

/// Merge word lists from several views into one completion list. The active
/// view comes first so its words rank closest to the cursor; each view is
/// capped, words outside the size bounds are dropped, and the first instance
/// of every word keeps its position.
pub fn merge_view_words(views: &[Vec<String>]) -> Vec<String> {
    let mut merged = Vec::new();
    for view_words in views.iter().take(MAX_VIEWS) {
        for word in view_words.iter().take(MAX_WORDS_PER_VIEW) {
            if word.len() < MIN_WORD_SIZE || word.len() > MAX_WORD_SIZE {
                continue;
            }
            if !merged.contains(word) {
                merged.push(word.clone());
            }
        }
    }
    merged
}

/// Tag table adapted from the Visualforce component reference. Charting
/// components are left out.
const VISUALFORCE_TAGS: &[(&str, &str)] = &[
    ("apex:actionFunction", "apex:actionFunction name=\"$1\" action=\"$2\" rerender=\"$3\" status=\"$4\"/>"),
    ("apex:actionPoller", "apex:actionPoller action=\"$1\" rerender=\"$2\" interval=\"$3\"/>"),
    ("apex:actionRegion", "apex:actionRegion>\n\t$1\n</apex:actionRegion>"),
    ("apex:actionStatus", "apex:actionStatus id=\"$1\"/>"),
    ("apex:actionSupport", "apex:actionSupport event=\"$1\" action=\"$2\" rerender=\"$3\" status=\"$4\"/>"),
    ("apex:attribute", "apex:attribute name=\"$1\" description=\"$2\" type=\"$3\" required=\"${4:true}\"/>"),
    ("apex:column", "apex:column value=\"$1\"/>"),
    ("apex:commandButton", "apex:commandButton action=\"$1\" value=\"$2\" id=\"$3\"/>"),
    ("apex:commandLink", "apex:commandLink action=\"$1\" value=\"$2\" id=\"$3\"/>"),
    ("apex:component", "apex:component>\n\t$1\n</apex:component>"),
    ("apex:componentBody", "apex:componentBody />"),
    ("apex:composition", "apex:composition template=\"$1\">\n\t$2\n</apex:composition>"),
    ("apex:dataList", "apex:dataList value=\"$1\" var=\"$2\" id=\"$3\">\n\t$4\n</apex:dataList>"),
    ("apex:dataTable", "apex:dataTable value=\"$1\" var=\"$2\" id=\"$3\">\n\t$4\n</apex:dataTable>"),
    ("apex:define", "apex:define name=\"$1\"/>"),
    ("apex:detail", "apex:detail subject=\"$1\" relatedList=\"${2:false}\" title=\"${3:false}\"/>"),
    ("apex:dynamicComponent", "apex:dynamicComponent componentValue=\"$1\"/>"),
    ("apex:emailPublisher", "apex:emailPublisher />"),
    ("apex:enhancedList", "apex:enhancedList type=\"$1\" height=\"$2\" rowsPerPage=\"$3\" id=\"$4\"/>"),
    ("apex:facet", "apex:facet name=\"$1\">$2<apex:facet/>"),
    ("apex:flash", "apex:flash src=\"$1\" height=\"$2\" width=\"$3\"/>"),
    ("apex:form", "apex:form id=\"$1\">\n\t$2\n</apex:form>"),
    ("apex:iframe", "apex:iframe src=\"$1\" scrolling=\"$2\" id=\"$3\"/>"),
    ("apex:image", "apex:image id=\"$1\" value=\"$2\" width=\"$3\" height=\"$4\"/>"),
    ("apex:include", "apex:include pageName=\"$1\"/>"),
    ("apex:includeScript", "apex:includeScript value=\"$1\"/>"),
    ("apex:inlineEditSupport", "apex:inlineEditSupport showOnEdit=\"$1\" cancelButton=\"$2\" hideOnEdit=\"$3\" event=\"$4\"/>"),
    ("apex:inputCheckbox", "apex:inputCheckbox value=\"$1\"/>"),
    ("apex:inputField", "apex:inputField value=\"$1\"/>"),
    ("apex:inputHidden", "apex:inputHidden value=\"$1\"/>"),
    ("apex:inputSecret", "apex:inputSecret value=\"$1\"/>"),
    ("apex:inputText", "apex:inputText value=\"$1\"/>"),
    ("apex:inputTextarea", "apex:inputTextarea value=\"$1\"/>"),
    ("apex:insert", "apex:insert name=\"$1\"/>"),
    ("apex:listViews", "apex:listViews name=\"$1\"/>"),
    ("apex:message", "apex:message for=\"$1\"/>"),
    ("apex:messages", "apex:messages />"),
    ("apex:outputField", "apex:outputField value=\"$1\"/>"),
    ("apex:outputLabel", "apex:outputLabel value=\"$1\" for=\"$2\"/>"),
    ("apex:outputLink", "apex:outputLink value=\"$1\"/>"),
    ("apex:outputPanel", "apex:outputPanel id=\"$1\">\n\t$2\n</apex:outputPanel>"),
    ("apex:outputText", "apex:outputText value=\"$1\"/>"),
    ("apex:page", "apex:page id=\"$1\">\n\t$2\n</apex:page>"),
    ("apex:pageBlock", "apex:pageBlock mode=\"${1:detail}\">\n\t$2\n</apex:pageBlock>"),
    ("apex:pageBlockButtons", "apex:pageBlockButtons>\n\t$1\n</apex:pageBlockButtons>"),
    ("apex:pageBlockSection", "apex:pageBlockSection title=\"$1\" columns=\"$2\">\n\t$3\n</apex:pageBlockSection>"),
    ("apex:pageBlockSectionItem", "apex:pageBlockSectionItem>\n\t$1\n</apex:pageBlockSectionItem>"),
    ("apex:pageBlockTable", "apex:pageBlockTable value=\"$1\" var=\"$2\">\n\t$3\n</apex:pageBlockTable>"),
    ("apex:pageMessage", "apex:pageMessage summary=\"$1\" serverity=\"$2\" strength=\"${3:3}\"/>"),
    ("apex:pageMessages", "apex:pageMessages />"),
    ("apex:panelBar", "apex:panelBar>\n\t$1\n</apex:panelBar>"),
    ("apex:panelBarItem", "apex:panelBarItem label=\"$1\">$2<apex:panelBarItem/>"),
    ("apex:panelGrid", "apex:panelGrid columns=\"$1\">\n\t$2\n</apex:panelGrid>"),
    ("apex:panelGroup", "apex:panelGroup id=\"$1\">\n\t$2\n</apex:panelGroup>"),
    ("apex:param", "apex:param value=\"$1\"/>"),
    ("apex:relatedList", "apex:relatedList list=\"$1\"/>"),
    ("apex:repeat", "apex:repeat value=\"$1\" var=\"$2\">\n\t$3\n</apex:repeat>"),
    ("apex:selectCheckboxes", "apex:selectCheckboxes value=\"$1\">\n\t$2\n</apex:selectCheckboxes>"),
    ("apex:selectList", "apex:selectList value=\"$1\" size=\"$2\">\n\t$3\n</apex:selectList>"),
    ("apex:selectOption", "apex:selectOption itemValue=\"$1\" itemLabel=\"$2\"/>"),
    ("apex:selectOptions", "apex:selectOptions value=\"$1\"/>"),
    ("apex:selectRadio", "apex:selectRadio value=\"$1\">\n\t$2\n</apex:selectRadio>"),
    ("apex:stylesheet", "apex:stylesheet value=\"$1\"/>"),
    ("apex:tab", "apex:tab label=\"$1\" name=\"$2\"/>"),
    ("apex:tabPanel", "apex:tabPanel>\n\t$2\n</apex:tabPanel>"),
    ("apex:toolbarGroup", "apex:toolbarGroup itemSeparator=\"$1\" id=\"$2\">\n\t$3\n</apex:toolbarGroup>"),
    ("apex:variable", "apex:variable var=\"$1\" value=\"$2\"/>"),
    ("apex:vote", "apex:vote objectId=\"$1\"/>"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn org_with_account() -> HashMap<String, FieldMap> {
        let mut fields = FieldMap::new();
        fields.insert("Name (string)".to_string(), "Name".to_string());
        fields.insert("Industry (picklist)".to_string(), "Industry".to_string());
        let mut org = HashMap::new();
        org.insert("Account".to_string(), fields);
        org
    }

    // ==================== declared type tests ====================

    #[test]
    fn test_declared_type_from_semicolon_declaration() {
        let source = "Account acc;\nacc.";
        assert_eq!(declared_type(source, "acc"), Some("Account".to_string()));
    }

    #[test]
    fn test_declared_type_from_assignment() {
        let source = "Account acc = new Account();";
        assert_eq!(declared_type(source, "acc"), Some("Account".to_string()));
    }

    #[test]
    fn test_declared_type_missing_variable() {
        assert_eq!(declared_type("Integer i = 0;", "acc"), None);
    }

    #[test]
    fn test_declared_type_does_not_match_other_variables() {
        let source = "Case c;\nAccount acc;";
        assert_eq!(declared_type(source, "acc"), Some("Account".to_string()));
        assert_eq!(declared_type(source, "c"), Some("Case".to_string()));
    }

    // ==================== field completion tests ====================

    #[test]
    fn test_field_completions_label_and_insertion() {
        let org = org_with_account();
        let completions =
            sobject_field_completions(&org, "Account acc;", "acc").unwrap();
        assert_eq!(completions.len(), 2);
        let name = completions
            .iter()
            .find(|c| c.label == "Account.Name (string)")
            .unwrap();
        assert_eq!(name.insert, "Name");
    }

    #[test]
    fn test_field_completions_capitalized_fallback() {
        let org = org_with_account();
        let completions =
            sobject_field_completions(&org, "account acc;", "acc").unwrap();
        assert!(completions
            .iter()
            .all(|c| c.label.starts_with("account.")));
        assert_eq!(completions.len(), 2);
    }

    #[test]
    fn test_field_completions_unknown_type_yields_none() {
        let org = org_with_account();
        assert!(sobject_field_completions(&org, "Invoice__c inv;", "inv").is_none());
    }

    // ==================== page completion tests ====================

    #[test]
    fn test_page_completions_require_angle_bracket() {
        assert!(page_completions('a').is_empty());
        let completions = page_completions('<');
        assert!(!completions.is_empty());
        assert!(completions.iter().any(|c| c.label == "apex:page"));
    }

    #[test]
    fn test_page_snippet_carries_tab_stops() {
        let completions = page_completions('<');
        let form = completions
            .iter()
            .find(|c| c.label == "apex:form")
            .unwrap();
        assert!(form.insert.contains("$1"));
        assert!(form.insert.contains("</apex:form>"));
    }

    // ==================== cross-view merge tests ====================

    #[test]
    fn test_merge_keeps_first_instance_and_order() {
        let views = vec![
            vec!["alpha".to_string(), "beta".to_string()],
            vec!["beta".to_string(), "gamma".to_string()],
        ];
        assert_eq!(merge_view_words(&views), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_merge_drops_words_outside_size_bounds() {
        let views = vec![vec![
            "ab".to_string(),
            "abc".to_string(),
            "x".repeat(MAX_WORD_SIZE + 1),
            "y".repeat(MAX_WORD_SIZE),
        ]];
        let merged = merge_view_words(&views);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], "abc");
    }

    #[test]
    fn test_merge_caps_views_and_words_per_view() {
        let views: Vec<Vec<String>> = (0..MAX_VIEWS + 5)
            .map(|v| {
                (0..MAX_WORDS_PER_VIEW + 50)
                    .map(|w| format!("word{}x{}", v, w))
                    .collect()
            })
            .collect();
        let merged = merge_view_words(&views);
        assert_eq!(merged.len(), MAX_VIEWS * MAX_WORDS_PER_VIEW);
        assert!(!merged.contains(&format!("word0x{}", MAX_WORDS_PER_VIEW)));
        assert!(!merged.contains(&format!("word{}x0", MAX_VIEWS)));
    }
}
