//! Formatting-preservation guarantees of the text-block editor.

use fleet_patcher::block::{delete_key_block, delete_key_block_all};
use proptest::prelude::*;

#[test]
fn untouched_lines_survive_byte_for_byte() {
    let input = concat!(
        "# Generated for the qa environment\n",
        "nameOverride: \"\"\n",
        "\n",
        "tolerations:\n",
        "- key: role\n",
        "  operator: Exists\n",
        "  effect: NoSchedule\n",
        "- key: zone\n",
        "  operator: Equal\n",
        "  value: us-east1-b\n",
        "\n",
        "# Pod scheduling\n",
        "affinity:\n",
        "  nodeAffinity:\n",
        "    requiredDuringSchedulingIgnoredDuringExecution:\n",
        "      nodeSelectorTerms:\n",
        "      - matchExpressions:\n",
        "        - key: role\n",
        "          operator: In\n",
        "          values:\n",
        "          - worker\n",
        "\n",
        "resources: {}\n",
    );

    let after_tolerations = delete_key_block(input, "tolerations");
    assert!(after_tolerations.removed);

    let after_affinity = delete_key_block(&after_tolerations.content, "affinity");
    assert!(after_affinity.removed);

    assert_eq!(
        after_affinity.content,
        concat!(
            "# Generated for the qa environment\n",
            "nameOverride: \"\"\n",
            "\n",
            "# Pod scheduling\n",
            "resources: {}\n",
        )
    );
}

#[test]
fn sibling_immediately_after_block_is_never_deleted() {
    // The non-interference guarantee: a key at the same indentation right
    // after the block's nested content terminates the block.
    let input = "drop:\n  deep:\n    deeper: 1\nkeep: 2\n";
    let result = delete_key_block(input, "drop");
    assert_eq!(result.content, "keep: 2\n");
}

#[test]
fn list_items_at_block_indent_belong_to_the_block() {
    let input = "allowed:\n- 10.0.0.0/8\n- 192.168.0.0/16\ndenied:\n- 0.0.0.0/0\n";
    let result = delete_key_block(input, "allowed");
    assert_eq!(result.content, "denied:\n- 0.0.0.0/0\n");
}

#[test]
fn crlf_lines_outside_the_block_are_not_rewritten() {
    let input = "keep: 1\r\ndrop:\r\n  nested: 2\r\nlast: 3\r\n";
    let result = delete_key_block(input, "drop");
    assert_eq!(result.content, "keep: 1\r\nlast: 3\r\n");
}

/// One sibling block at the requested indentation depth.
fn render_block(indent: &str, key: &str, value: u32, nested: bool) -> String {
    if nested {
        format!(
            "{indent}{key}:\n{indent}  child: {value}\n{indent}  items:\n{indent}  - entry-{value}\n"
        )
    } else {
        format!("{indent}{key}: {value}\n")
    }
}

fn render_document(depth: usize, blocks: &[String]) -> String {
    let mut doc = String::new();
    for level in 0..depth {
        doc.push_str(&"  ".repeat(level));
        doc.push_str(&format!("level{level}:\n"));
    }
    for block in blocks {
        doc.push_str(block);
    }
    doc
}

proptest! {
    /// Deleting one block leaves every sibling block and every enclosing
    /// parent line byte-identical, at any nesting depth.
    #[test]
    fn deleting_one_block_preserves_all_siblings(
        target in 0usize..4,
        depth in 0usize..3,
        values in prop::collection::vec(0u32..100, 4),
        nested_flags in prop::collection::vec(any::<bool>(), 4),
    ) {
        let indent = "  ".repeat(depth);
        let blocks: Vec<String> = (0..4)
            .map(|i| render_block(&indent, &format!("block{i}"), values[i], nested_flags[i]))
            .collect();

        let input = render_document(depth, &blocks);
        let result = delete_key_block_all(&input, &format!("block{target}"));
        prop_assert!(result.removed);

        let survivors: Vec<String> = (0..4)
            .filter(|i| *i != target)
            .map(|i| blocks[i].clone())
            .collect();
        let expected = render_document(depth, &survivors);
        prop_assert_eq!(result.content, expected);
    }
}
