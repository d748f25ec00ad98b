//! End-to-end planner runs against file-backed catalogs.

use std::path::{Path, PathBuf};

use pegasus_config::{PegasusProperties, Properties};
use pegasus_dax::{Adag, Job, Leaf};
use pegasus_planner::submit_dir::current_user;
use pegasus_planner::{PlannerError, PlannerOptions, RandomDir, plan};
use tempfile::TempDir;

const SITES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitecatalog xmlns="http://pegasus.isi.edu/schema/sitecatalog" version="4.0">
  <site handle="local" arch="x86_64" os="LINUX">
    <directory type="shared-scratch" path="/tmp/scratch">
      <file-server operation="all" url="file:///tmp/scratch"/>
    </directory>
  </site>
  <site handle="isi" arch="x86_64" os="LINUX">
    <grid type="gt5" contact="smarty.isi.edu/jobmanager-pbs" scheduler="PBS" jobtype="compute"/>
  </site>
</sitecatalog>
"#;

const TC: &str = r#"
tr preprocess {
  site local {
    pfn "/usr/bin/preprocess"
  }
}
tr findrange {
  site local {
    pfn "/usr/bin/findrange"
  }
  site isi {
    pfn "/opt/bin/findrange"
  }
}
tr analyze {
  site local {
    pfn "/usr/bin/analyze"
  }
}
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let etc = dir.path().join("home/etc");
        std::fs::create_dir_all(&etc).unwrap();
        std::fs::write(etc.join("sites.xml"), SITES).unwrap();
        std::fs::write(etc.join("tc.text"), TC).unwrap();
        Self { dir }
    }

    fn props(&self, extra: &[(&str, &str)]) -> PegasusProperties {
        let mut raw = Properties::new();
        for (k, v) in extra {
            raw.set(*k, *v);
        }
        PegasusProperties::resolve(raw, Some(self.dir.path().join("home"))).unwrap()
    }

    fn write_dax(&self, dax: &Adag) -> PathBuf {
        let path = self.dir.path().join(format!("{}.dax", dax.label()));
        dax.write_xml_file(&path).unwrap();
        path
    }

    fn options(&self, dax: &Path) -> PlannerOptions {
        let mut options = PlannerOptions::new(dax);
        options.base_dir = self.dir.path().join("submit");
        options
    }
}

fn diamond() -> Adag {
    let mut dag = Adag::with_name("diamond");
    let mut top = Job::new("ID1", "preprocess");
    top.add_argument(Leaf::text("-a top"));
    dag.add_job(top);
    dag.add_job(Job::new("ID2", "findrange"));
    dag.add_job(Job::new("ID3", "findrange"));
    dag.add_job(Job::new("ID4", "analyze"));
    dag.add_child_edge("ID2", "ID1");
    dag.add_child_edge("ID3", "ID1");
    dag.add_child_edge("ID4", "ID2");
    dag.add_child_edge("ID4", "ID3");
    dag
}

#[tokio::test]
async fn test_plan_condor_workflow() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let outcome = plan(&fx.props(&[]), &fx.options(&dax)).await.unwrap();

    let expected = fx
        .dir
        .path()
        .join("submit")
        .join(current_user())
        .join("pegasus/diamond/run0001");
    assert_eq!(outcome.submit_dir, expected);
    assert!(!outcome.rescue);
    assert!(!outcome.empty);
    assert_eq!(outcome.files[0], expected.join("diamond-0.dag"));
    assert!(outcome.properties_file.starts_with(&expected));
    assert!(expected.join("diamond.dax").exists());
    assert!(outcome.invocation().starts_with("pegasus-run -Dpegasus.user.properties="));

    let dag = std::fs::read_to_string(&outcome.files[0]).unwrap();
    assert!(dag.contains("PARENT preprocess_ID1 CHILD findrange_ID2"));
    assert!(dag.contains("PARENT findrange_ID3 CHILD analyze_ID4"));
    // round robin puts ID3 on isi first, and isi has findrange
    let sub = std::fs::read_to_string(expected.join("findrange_ID3.sub")).unwrap();
    assert!(sub.contains("+pegasus_site = \"isi\""), "{sub}");
    assert!(sub.contains("grid_resource = gt5 smarty.isi.edu/jobmanager-pbs"));
}

#[tokio::test]
async fn test_second_plan_gets_next_run() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let props = fx.props(&[]);
    plan(&props, &fx.options(&dax)).await.unwrap();
    let second = plan(&props, &fx.options(&dax)).await.unwrap();
    assert!(second.submit_dir.ends_with("diamond/run0002"));
}

#[tokio::test]
async fn test_shell_generator_with_cleanup() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let mut options = fx.options(&dax);
    options.sites = vec!["local".to_string()];
    options.random_dir = RandomDir::Named("scratch-run".to_string());
    options.basename = Some("wf".to_string());

    let outcome = plan(&fx.props(&[("pegasus.code.generator", "Shell")]), &options)
        .await
        .unwrap();
    assert_eq!(outcome.files, vec![outcome.submit_dir.join("wf.sh")]);
    let script = std::fs::read_to_string(&outcome.files[0]).unwrap();
    assert!(script.contains("cd /tmp/scratch/scratch-run"));

    let cleanup = std::fs::read_to_string(outcome.submit_dir.join("cleanup/wf.sh")).unwrap();
    assert!(cleanup.contains("/bin/rm -rf /tmp/scratch/scratch-run"));
    assert_eq!(outcome.cleanup_files.len(), 1);
}

#[tokio::test]
async fn test_nocleanup_skips_cleanup_workflow() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let mut options = fx.options(&dax);
    options.random_dir = RandomDir::Generated;
    options.cleanup = false;
    let outcome = plan(&fx.props(&[]), &options).await.unwrap();
    assert!(outcome.cleanup_files.is_empty());
    assert!(!outcome.submit_dir.join("cleanup").exists());
}

#[tokio::test]
async fn test_empty_dax_gets_noop() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&Adag::with_name("nothing"));
    let outcome = plan(&fx.props(&[]), &fx.options(&dax)).await.unwrap();
    assert!(outcome.empty);
    let dag = std::fs::read_to_string(&outcome.files[0]).unwrap();
    assert!(dag.contains("JOB noop_nothing_0 noop_nothing_0.sub NOOP"));
}

#[tokio::test]
async fn test_unknown_site() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let mut options = fx.options(&dax);
    options.sites = vec!["local".to_string(), "mars".to_string()];
    let err = plan(&fx.props(&[]), &options).await.unwrap_err();
    assert!(matches!(err, PlannerError::UnknownSite(ref s) if s == "mars"));

    let mut options = fx.options(&dax);
    options.output_site = Some("venus".to_string());
    let err = plan(&fx.props(&[]), &options).await.unwrap_err();
    assert!(matches!(err, PlannerError::UnknownSite(ref s) if s == "venus"));
}

#[tokio::test]
async fn test_unmapped_transformation() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let mut options = fx.options(&dax);
    options.sites = vec!["isi".to_string()];
    let err = plan(&fx.props(&[]), &options).await.unwrap_err();
    assert!(matches!(err, PlannerError::Unmapped { .. }));
}

#[tokio::test]
async fn test_unknown_generator_is_factory_error() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let err = plan(&fx.props(&[("pegasus.code.generator", "DAGLite")]), &fx.options(&dax))
        .await
        .unwrap_err();
    let factory = err.factory().expect("factory error");
    assert_eq!(factory.module, "code generator");

    let err = plan(&fx.props(&[("pegasus.catalog.site", "Database")]), &fx.options(&dax))
        .await
        .unwrap_err();
    assert!(err.factory().is_some());
}

#[tokio::test]
async fn test_relative_submit_dir_requires_force() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let mut options = fx.options(&dax);
    options.relative_submit_dir = Some("fixed".to_string());
    plan(&fx.props(&[]), &options).await.unwrap();

    let err = plan(&fx.props(&[]), &options).await.unwrap_err();
    assert!(matches!(err, PlannerError::Directory { .. }));

    options.force = true;
    plan(&fx.props(&[]), &options).await.unwrap();
}

#[tokio::test]
async fn test_failed_plan_leaves_submit_dir_reusable() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let mut options = fx.options(&dax);
    options.relative_submit_dir = Some("retry".to_string());
    options.output_site = Some("venus".to_string());
    let err = plan(&fx.props(&[]), &options).await.unwrap_err();
    assert!(matches!(err, PlannerError::UnknownSite(_)));

    options.output_site = None;
    let err = plan(&fx.props(&[("pegasus.code.generator", "DAGLite")]), &options)
        .await
        .unwrap_err();
    assert!(err.factory().is_some());

    let outcome = plan(&fx.props(&[]), &options).await.unwrap();
    assert!(outcome.submit_dir.ends_with("retry"));
    assert!(outcome.properties_file.exists());
}

#[tokio::test]
async fn test_rescue_dag_resubmitted() {
    let fx = Fixture::new();
    let dax = fx.write_dax(&diamond());
    let mut options = fx.options(&dax);
    options.relative_submit_dir = Some("fixed".to_string());
    options.rescue_tries = 2;

    let first = plan(&fx.props(&[]), &options).await.unwrap();
    assert!(!first.rescue);

    let second = plan(&fx.props(&[]), &options).await.unwrap();
    assert!(second.rescue);
    assert_eq!(second.files, vec![first.submit_dir.join("diamond-0.dag")]);

    std::fs::write(first.submit_dir.join("diamond-0.dag.rescue002"), "").unwrap();
    let third = plan(&fx.props(&[]), &options).await.unwrap();
    assert!(!third.rescue);
}
