use serde_json::Value;

use super::{JsonPath, ValidationIssue};

const INDENT: &str = "    ";
const MISSING: &str = "???";

/// Pretty-prints `document` with every issue drawn around its node.
///
/// Each annotated node is framed by a `vvv` line above and a
/// `^^^ Error: <message>` line below, both as wide as the widest line of
/// the node. Keys reported missing are rendered as `"key": ???` so the
/// annotation has something to point at. Issues whose path does not exist
/// in the document are listed after it.
///
/// Object keys are rendered in sorted order.
pub fn render_annotated(document: &Value, issues: &[ValidationIssue]) -> String {
    let mut renderer = Renderer {
        issues,
        rendered: vec![false; issues.len()],
        lines: Vec::new(),
    };
    let mut path = JsonPath::root();
    renderer.node(None, document, &mut path, 0, false);

    for (issue, done) in issues.iter().zip(&renderer.rendered) {
        if !done {
            renderer
                .lines
                .push(format!("Error at {}: {}", issue.path, issue.message));
        }
    }
    renderer.lines.join("\n")
}

struct Renderer<'a> {
    issues: &'a [ValidationIssue],
    rendered: Vec<bool>,
    lines: Vec<String>,
}

impl Renderer<'_> {
    fn node(
        &mut self,
        key: Option<&str>,
        value: &Value,
        path: &mut JsonPath,
        depth: usize,
        comma: bool,
    ) {
        let message = self.take_messages(path);
        let header = message.as_ref().map(|_| self.placeholder());

        let pad = INDENT.repeat(depth);
        let prefix = key.map(|k| format!("{}: ", quote(k))).unwrap_or_default();
        let tail = if comma { "," } else { "" };

        match value {
            Value::Object(map) if !map.is_empty() || self.has_missing_children(path) => {
                self.lines.push(format!("{pad}{prefix}{{"));
                let missing = self.missing_children(path, map);
                let total = map.len() + missing.len();

                for (i, (k, v)) in map.iter().enumerate() {
                    path.push_key(k.as_str());
                    self.node(Some(k.as_str()), v, path, depth + 1, i + 1 < total);
                    path.pop();
                }
                for (j, k) in missing.iter().enumerate() {
                    path.push_key(k.as_str());
                    self.missing(k, path, depth + 1, map.len() + j + 1 < total);
                    path.pop();
                }
                self.lines.push(format!("{pad}}}{tail}"));
            }
            Value::Array(items) if !items.is_empty() => {
                self.lines.push(format!("{pad}{prefix}["));
                for (i, item) in items.iter().enumerate() {
                    path.push_index(i);
                    self.node(None, item, path, depth + 1, i + 1 < items.len());
                    path.pop();
                }
                self.lines.push(format!("{pad}]{tail}"));
            }
            scalar => {
                self.lines.push(format!("{pad}{prefix}{}{tail}", scalar));
            }
        }

        if let (Some(message), Some(header)) = (message, header) {
            self.annotate(header, depth, &message);
        }
    }

    fn missing(&mut self, key: &str, path: &JsonPath, depth: usize, comma: bool) {
        let message = self.take_messages(path);
        let header = message.as_ref().map(|_| self.placeholder());
        let tail = if comma { "," } else { "" };
        self.lines.push(format!(
            "{}{}: {MISSING}{tail}",
            INDENT.repeat(depth),
            quote(key)
        ));
        if let (Some(message), Some(header)) = (message, header) {
            self.annotate(header, depth, &message);
        }
    }

    /// Marks every issue at `path` as rendered and joins their messages.
    fn take_messages(&mut self, path: &JsonPath) -> Option<String> {
        let mut messages = Vec::new();
        for (i, issue) in self.issues.iter().enumerate() {
            if !self.rendered[i] && &issue.path == path {
                self.rendered[i] = true;
                messages.push(issue.message.as_str());
            }
        }
        (!messages.is_empty()).then(|| messages.join("; "))
    }

    fn has_missing_children(&self, path: &JsonPath) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.path.child_key_of(path).is_some())
    }

    /// Keys under `path` that issues refer to but the object lacks.
    fn missing_children(
        &self,
        path: &JsonPath,
        map: &serde_json::Map<String, Value>,
    ) -> Vec<String> {
        let mut keys: Vec<String> = self
            .issues
            .iter()
            .filter_map(|issue| issue.path.child_key_of(path))
            .filter(|key| !map.contains_key(*key))
            .map(str::to_string)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    fn placeholder(&mut self) -> usize {
        self.lines.push(String::new());
        self.lines.len() - 1
    }

    fn annotate(&mut self, header: usize, depth: usize, message: &str) {
        let indent = depth * INDENT.len();
        let width = self.lines[header + 1..]
            .iter()
            .map(|line| line.chars().count().saturating_sub(indent))
            .max()
            .unwrap_or(0)
            .max(1);

        let pad = INDENT.repeat(depth);
        self.lines[header] = format!("{pad}{}", "v".repeat(width));
        self.lines
            .push(format!("{pad}{} Error: {message}", "^".repeat(width)));
    }
}

fn quote(key: &str) -> String {
    Value::String(key.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::IssueKind;
    use serde_json::json;

    fn issue(path: JsonPath, message: &str) -> ValidationIssue {
        ValidationIssue::new(path, IssueKind::WrongType, message)
    }

    #[test]
    fn test_no_issues_pretty_prints() {
        let doc = json!({ "uri": "dataset", "coord": { "x": 1, "y": 2, "z": 3 } });
        let expected = [
            "{",
            "    \"coord\": {",
            "        \"x\": 1,",
            "        \"y\": 2,",
            "        \"z\": 3",
            "    },",
            "    \"uri\": \"dataset\"",
            "}",
        ]
        .join("\n");
        assert_eq!(render_annotated(&doc, &[]), expected);
    }

    #[test]
    fn test_scalar_annotation() {
        let doc = json!({ "uri": 5 });
        let rendered = render_annotated(
            &doc,
            &[issue(JsonPath::root().key("uri"), "`uri` is not of type `string`")],
        );
        let expected = [
            "{",
            "    vvvvvvvv",
            "    \"uri\": 5",
            "    ^^^^^^^^ Error: `uri` is not of type `string`",
            "}",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_missing_key_is_rendered() {
        let doc = json!({ "coord": { "x": 1, "z": 3 } });
        let rendered = render_annotated(
            &doc,
            &[issue(JsonPath::root().key("coord").key("y"), "`coord.y` not found")],
        );
        let expected = [
            "{",
            "    \"coord\": {",
            "        \"x\": 1,",
            "        \"z\": 3,",
            "        vvvvvvvvvv",
            "        \"y\": ???",
            "        ^^^^^^^^^^ Error: `coord.y` not found",
            "    }",
            "}",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_missing_key_in_empty_object() {
        let doc = json!({});
        let rendered =
            render_annotated(&doc, &[issue(JsonPath::root().key("uri"), "`uri` not found")]);
        assert!(rendered.starts_with("{\n"));
        assert!(rendered.contains("    \"uri\": ???\n"));
        assert!(rendered.contains("Error: `uri` not found"));
        assert!(rendered.ends_with("\n}"));
    }

    #[test]
    fn test_container_annotation_spans_widest_line() {
        let doc = json!({ "query": ["a", "AND"] });
        let rendered = render_annotated(
            &doc,
            &[issue(JsonPath::root().key("query"), "expression is incomplete")],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        // widest line of the node is `"query": [` at 10 characters
        assert_eq!(lines[1], "    vvvvvvvvvv");
        assert_eq!(lines[2], "    \"query\": [");
        assert_eq!(lines[5], "    ]");
        assert_eq!(lines[6], "    ^^^^^^^^^^ Error: expression is incomplete");
    }

    #[test]
    fn test_array_element_annotation() {
        let doc = json!(["a", "XOR", "b"]);
        let rendered = render_annotated(
            &doc,
            &[issue(JsonPath::root().index(1), "invalid operator `XOR`")],
        );
        let expected = [
            "[",
            "    \"a\",",
            "    vvvvvv",
            "    \"XOR\",",
            "    ^^^^^^ Error: invalid operator `XOR`",
            "    \"b\"",
            "]",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_issues_on_same_node_are_joined() {
        let doc = json!({ "uri": 5 });
        let path = JsonPath::root().key("uri");
        let rendered =
            render_annotated(&doc, &[issue(path.clone(), "first"), issue(path, "second")]);
        assert!(rendered.contains("Error: first; second"));
    }

    #[test]
    fn test_unplaceable_issue_is_listed_after_document() {
        let doc = json!({ "coord": 5 });
        let rendered = render_annotated(
            &doc,
            &[issue(JsonPath::root().key("coord").key("x"), "`coord.x` not found")],
        );
        assert!(rendered.ends_with("Error at coord.x: `coord.x` not found"));
    }

    #[test]
    fn test_root_annotation() {
        let doc = json!("nope");
        let rendered =
            render_annotated(&doc, &[issue(JsonPath::root(), "not an object")]);
        assert_eq!(rendered, "vvvvvv\n\"nope\"\n^^^^^^ Error: not an object");
    }
}
