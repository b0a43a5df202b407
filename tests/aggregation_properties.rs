use placement_pulse::ingest::read_upload;
use placement_pulse::{
    compute_all_institutions_summary, compute_global_branch_wise, compute_global_stats,
    compute_institution_analytics, LooseValue, PlacementRecord, YearFilter,
};

const UPLOAD: &str = "batchYear,studentName,branch,company,package,status\n\
2024,Avery Lee,CS,Acme,10,Placed\n\
2024,Jules Moreno,CS,0,0,Not Placed\n\
2024,Kiara Patel,EE,Globex,22.5,PLACED\n\
2023,Rohan Mehta,EE,Globex,abc, placed \n\
2023,Sana Iyer,,Initech,4,Intern\n\
,Dev Rao,ME,,,\n\
2023,Meera Nair,ME,Acme,13.25,placed\n";

fn corpus() -> Vec<PlacementRecord> {
    let mut records = read_upload(UPLOAD.as_bytes(), "IITB").unwrap();
    records.push(PlacementRecord {
        institution_id: "NITK".to_string(),
        batch_year: LooseValue::Number(2024.0),
        student_name: "Ishaan Rao".to_string(),
        branch: None,
        company: None,
        compensation: LooseValue::Number(7.0),
        status: Some("Placed".to_string()),
    });
    records
}

#[test]
fn institution_analytics_respect_core_bounds() {
    let records = corpus();
    let analytics = compute_institution_analytics(&records, &YearFilter::All);

    assert!(analytics.placed_students <= analytics.total_students);
    assert!((0.0..=100.0).contains(&analytics.placement_rate));
    assert!(analytics.avg_package <= analytics.highest_package);
    assert!(analytics.company_wise.len() <= 10);
    assert!(analytics
        .company_wise
        .windows(2)
        .all(|pair| pair[0].count >= pair[1].count));

    // Four placed records have a positive package: 10, 22.5, 13.25 and 7.
    let banded: usize = analytics
        .package_distribution
        .iter()
        .map(|band| band.count)
        .sum();
    assert_eq!(banded, 4);
    assert_eq!(analytics.placed_students, 5);
    assert_eq!(analytics.total_students, 8);
    assert_eq!(analytics.highest_package, 22.5);
}

#[test]
fn sentinel_companies_never_count() {
    let records = corpus();
    let analytics = compute_institution_analytics(&records, &YearFilter::All);

    assert_eq!(analytics.total_companies, 3);
    assert!(analytics
        .company_wise
        .iter()
        .all(|entry| entry.company != "0" && !entry.company.is_empty()));

    let global = compute_global_stats(&records);
    assert_eq!(global.total_companies, 3);
    for branch in compute_global_branch_wise(&records) {
        assert!(branch.companies.iter().all(|name| name != "0"));
    }
}

#[test]
fn upload_sentinels_flow_through_as_absent() {
    let records = corpus();
    let analytics = compute_institution_analytics(&records, &"0".parse().unwrap());

    // The row with a blank batch year is stored under year 0.
    assert_eq!(analytics.total_students, 1);
    assert_eq!(analytics.placed_students, 0);
    assert_eq!(analytics.total_companies, 0);
    assert!(analytics.package_distribution.is_empty());
}

#[test]
fn aggregation_is_idempotent() {
    let records = corpus();

    let first = serde_json::to_string(&compute_institution_analytics(&records, &YearFilter::All))
        .unwrap();
    let second = serde_json::to_string(&compute_institution_analytics(&records, &YearFilter::All))
        .unwrap();
    assert_eq!(first, second);

    let first = serde_json::to_string(&compute_global_branch_wise(&records)).unwrap();
    let second = serde_json::to_string(&compute_global_branch_wise(&records)).unwrap();
    assert_eq!(first, second);

    let first = serde_json::to_string(&compute_all_institutions_summary(&records)).unwrap();
    let second = serde_json::to_string(&compute_all_institutions_summary(&records)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn empty_input_serializes_to_zeroed_payload() {
    let analytics = compute_institution_analytics(&[], &YearFilter::All);
    let json = serde_json::to_value(&analytics).unwrap();

    assert_eq!(
        json,
        serde_json::json!({
            "totalStudents": 0,
            "placedStudents": 0,
            "placementRate": 0.0,
            "avgPackage": 0.0,
            "highestPackage": 0.0,
            "totalCompanies": 0,
            "branchWise": [],
            "companyWise": [],
            "yearWise": [],
            "packageDistribution": []
        })
    );
}

#[test]
fn institutions_summary_splits_the_corpus() {
    let summaries = compute_all_institutions_summary(&corpus());

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].institution_id, "IITB");
    assert_eq!(summaries[0].total_students, 7);
    assert_eq!(summaries[1].institution_id, "NITK");
    assert_eq!(summaries[1].placement_rate, 100.0);
    assert_eq!(summaries[1].total_companies, 0);
}
