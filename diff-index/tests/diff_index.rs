//! Parser and digest behavior over realistic diffs.

use diff_index::{DiffIndex, Side};

const SIMPLE: &str = "\
diff --git a/src/foo.ts b/src/foo.ts
index 1111111..2222222 100644
--- a/src/foo.ts
+++ b/src/foo.ts
@@ -40,7 +40,8 @@ export function handle(input) {
   const parsed = parse(input);
   const user = lookup(parsed);
-  return user.name;
+  if (user == null) return null;
+  return user.name;
   // trailing
 }

";

#[test]
fn files_strip_one_prefix_level() {
    let idx = DiffIndex::parse(SIMPLE);
    assert_eq!(idx.files(), &["src/foo.ts".to_string()]);
}

#[test]
fn preserves_real_top_level_a_directory() {
    let diff = "\
--- a/a/config.ts
+++ b/a/config.ts
@@ -1,2 +1,2 @@
-const x = 1;
+const x = 2;
 export default x;
";
    let idx = DiffIndex::parse(diff);
    assert_eq!(idx.files(), &["a/config.ts".to_string()]);
    assert!(idx.is_line_in_diff("a/config.ts", 1, Side::Right));
}

#[test]
fn line_membership_respects_sides() {
    let idx = DiffIndex::parse(SIMPLE);

    // Added lines answer on RIGHT; the same numbers are the deleted line on LEFT.
    assert!(idx.is_line_in_diff("src/foo.ts", 42, Side::Right));
    assert!(idx.is_line_in_diff("src/foo.ts", 43, Side::Right));

    // The deleted `return` lives at old 42.
    assert!(idx.is_line_in_diff("src/foo.ts", 42, Side::Left));

    // Context lines exist on both sides.
    assert!(idx.is_line_in_diff("src/foo.ts", 40, Side::Right));
    assert!(idx.is_line_in_diff("src/foo.ts", 40, Side::Left));

    // Outside any hunk.
    assert!(!idx.is_line_in_diff("src/foo.ts", 5, Side::Right));
    assert!(!idx.is_line_in_diff("src/foo.ts", 200, Side::Right));
    assert!(!idx.is_line_in_diff("src/other.ts", 42, Side::Right));
}

#[test]
fn added_lines_and_stats() {
    let idx = DiffIndex::parse(SIMPLE);
    assert_eq!(idx.added_lines("src/foo.ts"), vec![42, 43]);
    let stats = idx.file_stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].additions, 2);
    assert_eq!(stats[0].deletions, 1);
}

#[test]
fn hunk_hash_is_stable_under_line_shift() {
    let idx = DiffIndex::parse(SIMPLE);
    let original = idx.hunk_hash("src/foo.ts", 42, Side::Right).unwrap();
    assert_eq!(original.len(), 16);

    // Same hunk body, shifted 5 lines down by unrelated additions above.
    let shifted = SIMPLE.replace("@@ -40,7 +40,8 @@", "@@ -45,7 +45,8 @@");
    let idx2 = DiffIndex::parse(&shifted);
    assert_eq!(
        idx2.hunk_hash("src/foo.ts", 47, Side::Right).unwrap(),
        original
    );
}

#[test]
fn context_hash_tracks_unchanged_neighborhood() {
    let idx = DiffIndex::parse(SIMPLE);
    let at_new = idx.context_hash("src/foo.ts", 42, Side::Right).unwrap();
    assert_eq!(at_new.len(), 16);

    let shifted = SIMPLE.replace("@@ -40,7 +40,8 @@", "@@ -90,7 +90,8 @@");
    let idx2 = DiffIndex::parse(&shifted);
    assert_eq!(
        idx2.context_hash("src/foo.ts", 92, Side::Right).unwrap(),
        at_new
    );
}

#[test]
fn deleted_file_keys_under_old_path() {
    let diff = "\
diff --git a/src/gone.ts b/src/gone.ts
deleted file mode 100644
--- a/src/gone.ts
+++ /dev/null
@@ -1,2 +0,0 @@
-const a = 1;
-export default a;
";
    let idx = DiffIndex::parse(diff);
    assert!(idx.contains_path("src/gone.ts"));
    assert!(idx.is_line_in_diff("src/gone.ts", 1, Side::Left));
    assert!(!idx.is_line_in_diff("src/gone.ts", 1, Side::Right));
}

#[test]
fn tolerates_binary_and_mode_noise() {
    let diff = "\
diff --git a/logo.png b/logo.png
Binary files a/logo.png and b/logo.png differ
diff --git a/src/x.rs b/src/x.rs
old mode 100644
new mode 100755
--- a/src/x.rs
+++ b/src/x.rs
@@ -1 +1 @@
-fn main() {}
+fn main() { run(); }
";
    let idx = DiffIndex::parse(diff);
    assert_eq!(idx.files(), &["src/x.rs".to_string()]);
    assert!(idx.is_line_in_diff("src/x.rs", 1, Side::Right));
}
