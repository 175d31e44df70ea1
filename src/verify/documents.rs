//! Document acquisition and the per-document classify+verify pipeline.
//!
//! Acquisition streams each attachment into the document store under its
//! `(job_no, file_name)` identity. Verification fans documents out over a
//! semaphore-bounded task set; each worker renders pages, asks the
//! verification model for a verdict, lifts discrepancies, and records the
//! classification on the stored row.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::erp::{ErpApi, ReferenceBundles};
use crate::llm::{DocumentType, DocumentVerifier};
use crate::render::{PageRenderer, all_synthetic};
use crate::state::{JobDocument, NewDocument, StateStore, UNCLASSIFIED};

use super::discrepancy::{Finding, lift_verdict};

/// Download every attachment URL and upsert it into the document store.
///
/// A failed download becomes a flagging finding; it never fails the request.
pub(crate) async fn acquire_documents(
    store: &StateStore,
    erp: &dyn ErpApi,
    job_no: &str,
    urls: &[String],
) -> (Vec<JobDocument>, Vec<Finding>) {
    let mut documents = Vec::new();
    let mut findings = Vec::new();

    for url in urls {
        match erp.download_document(url).await {
            Ok(downloaded) => {
                let upsert = store
                    .upsert_document(NewDocument {
                        job_no: job_no.to_string(),
                        file_name: downloaded.file_name.clone(),
                        document_type: UNCLASSIFIED.to_string(),
                        content_type: downloaded.content_type,
                        source_url: url.clone(),
                        data: downloaded.bytes,
                    })
                    .await;
                match upsert {
                    Ok(document) => documents.push(document),
                    Err(err) => {
                        warn!(job_no, url, error = %err, "Document store upsert failed");
                        findings.push(Finding::flagging(format!(
                            "document {} unavailable: storage failed ({err})",
                            downloaded.file_name
                        )));
                    }
                }
            }
            Err(err) => {
                warn!(job_no, url, error = %err, "Document download failed");
                findings.push(Finding::flagging(format!(
                    "document {} unavailable: {err}",
                    display_name(url)
                )));
            }
        }
    }

    (documents, findings)
}

/// Classify and verify every acquired document with bounded parallelism.
pub(crate) async fn verify_documents(
    store: &StateStore,
    verifier: &Arc<dyn DocumentVerifier>,
    renderer: &Arc<dyn PageRenderer>,
    bundles: &Arc<ReferenceBundles>,
    documents: Vec<JobDocument>,
    concurrency: usize,
) -> Vec<Finding> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<(usize, Vec<Finding>)> = JoinSet::new();

    for (index, document) in documents.into_iter().enumerate() {
        let permit_pool = semaphore.clone();
        let store = store.clone();
        let verifier = verifier.clone();
        let renderer = renderer.clone();
        let bundles = bundles.clone();

        tasks.spawn(async move {
            let _permit = permit_pool
                .acquire_owned()
                .await
                .expect("document semaphore closed");
            let findings = process_document(&store, &verifier, &renderer, &bundles, &document).await;
            (index, findings)
        });
    }

    let mut results: Vec<(usize, Vec<Finding>)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(err) => {
                warn!(error = %err, "Document verification task panicked");
                results.push((
                    usize::MAX,
                    vec![Finding::flagging(format!(
                        "document verification aborted: {err}"
                    ))],
                ));
            }
        }
    }

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().flat_map(|(_, f)| f).collect()
}

async fn process_document(
    store: &StateStore,
    verifier: &Arc<dyn DocumentVerifier>,
    renderer: &Arc<dyn PageRenderer>,
    bundles: &Arc<ReferenceBundles>,
    document: &JobDocument,
) -> Vec<Finding> {
    let job_no = &document.job_no;
    let file_name = &document.file_name;

    let bytes = match store.document_data(job_no, file_name).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(job_no, file_name, error = %err, "Stored document unreadable");
            return vec![Finding::flagging(format!(
                "document {file_name} unavailable: {err}"
            ))];
        }
    };

    let pages = renderer.render(file_name, bytes).await;
    let unreadable = all_synthetic(&pages);

    let mut verdict = verifier.classify_and_verify(job_no, &pages, bundles).await;
    if unreadable {
        // An unreadable document cannot carry a trustworthy classification
        verdict.force_unknown();
    }

    debug!(
        job_no,
        file_name,
        document_type = %verdict.document_type,
        confidence = verdict.classification_confidence,
        discrepancies = verdict.discrepancies.len(),
        "Document verdict"
    );

    if verdict.document_type != DocumentType::Unknown {
        match store.set_classified_type(job_no, file_name, verdict.document_type.as_str()) {
            Ok(true) => debug!(job_no, file_name, "Classification stored"),
            Ok(false) => {}
            Err(err) => warn!(job_no, file_name, error = %err, "Failed to store classification"),
        }
    }

    lift_verdict(file_name, &verdict)
}

fn display_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|tail| !tail.is_empty())
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_takes_url_tail() {
        assert_eq!(
            display_name("https://sp.example/docs/quote.pdf?web=1"),
            "quote.pdf"
        );
        assert_eq!(display_name("opaque-token"), "opaque-token");
    }
}
