//! Whole-document behavior: building, serializing and reading back DAX.

use pegasus_dax::{
    Adag, Child, Filename, Job, Leaf, LinkType, Profile, TransferMode, parse_file, parse_str,
};
use tempfile::TempDir;

/// Two jobs connected through f.txt, the smallest interesting workflow.
fn producer_consumer() -> Adag {
    let mut dag = Adag::with_name("pc");

    let mut a = Job::new("a", "produce");
    a.add_argument(Leaf::text("-o "));
    a.add_argument(Filename::with_link("f.txt", LinkType::Output));
    a.add_uses(Filename::with_link("f.txt", LinkType::Output));
    dag.add_job(a);

    let mut b = Job::new("b", "consume");
    b.add_argument(Leaf::text("-i "));
    b.add_argument(Filename::with_link("f.txt", LinkType::Input));
    b.add_uses(Filename::with_link("f.txt", LinkType::Input));
    b.add_profile(Profile::with_text("env", "MODE", "fast & loose"));
    dag.add_job(b);

    dag.add_filename("f.txt", false, None, false, TransferMode::Mandatory);
    dag.add_filename("f.txt", true, None, false, TransferMode::Mandatory);
    dag.add_child(Child::with_parent("b", "a"));
    dag
}

#[test]
fn test_producer_consumer_scenario() {
    let dag = producer_consumer();

    assert_eq!(dag.child_count(), 1);
    assert_eq!(dag.filename("f.txt").unwrap().link(), LinkType::InOut);

    let xml = dag.to_xml();
    assert_eq!(xml.matches("<job id=\"a\"").count(), 1);
    assert_eq!(xml.matches("<job id=\"b\"").count(), 1);
    assert!(xml.contains("<child ref=\"b\">\n    <parent ref=\"a\"/>\n  </child>"));
}

#[test]
fn test_xml_round_trip_preserves_counts() {
    let mut dag = producer_consumer();
    dag.add_job(Job::new("c", "report"));
    dag.add_child_edge("c", "b");
    dag.add_child_edge("c", "a");
    dag.add_child_placeholder("a");
    dag.add_filename("report.pdf", false, Some("scratch"), true, TransferMode::Optional);

    let reparsed = parse_str(&dag.to_xml()).unwrap();

    assert_eq!(reparsed.file_count(), dag.file_count());
    assert_eq!(reparsed.job_count(), dag.job_count());
    // parentless records are not written out
    assert_eq!(reparsed.child_count(), 2);
    assert_eq!(dag.child_count(), 3);

    let report = reparsed.filename("report.pdf").unwrap();
    assert_eq!(report.temporary_hint(), Some("scratch"));
    assert!(!report.register());
    assert_eq!(report.transfer(), TransferMode::Optional);

    let b = reparsed.job("b").unwrap();
    assert_eq!(b.argument_line(), "-i f.txt");
    assert_eq!(b.profile("env", "MODE").unwrap().value(), "fast & loose");
    assert_eq!(b.uses().len(), 1);
}

#[test]
fn test_round_trip_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pc.dax");
    producer_consumer().write_xml_file(&path).unwrap();

    let reparsed = parse_file(&path).unwrap();
    assert_eq!(reparsed.name(), Some("pc"));
    assert!(reparsed.child("b").unwrap().has_parent("a"));
}

#[test]
fn test_collapse_then_serialize() {
    let mut dag = producer_consumer();
    dag.add_job(Job::new("ab", "merged"));
    dag.add_job(Job::new("z", "sink"));
    dag.add_child_edge("z", "b");
    dag.replace_parent("a", "ab");
    dag.replace_parent("b", "ab");
    dag.rebuild();
    dag.remove_job("a");
    dag.remove_job("b");

    // b->a collapses into a self-edge on ab; z now waits on ab
    assert!(dag.child("z").unwrap().has_parent("ab"));
    let text = dag.to_string();
    assert!(text.contains("CHILD z PARENT ab"));
    assert!(dag.dangling_references().is_empty());
}

#[test]
fn test_missing_file_reports_path() {
    let err = parse_file(std::path::Path::new("/nonexistent/workflow.dax")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/workflow.dax"));
}
