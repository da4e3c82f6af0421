//! Turns a [`TargetDescriptor`] into the content it currently points at.
//!
//! Walk per mode:
//! - static: fetch the entry URL.
//! - single page: fetch the entry page, extract candidates, accept the first whose body
//!   matches the verify pattern.
//! - multi step: single page walk, then capture group 1 of the verify pattern builds one
//!   chained URL, which must match the chain's own verify pattern.

use tracing::{debug, warn};
use url::Url;

use crate::error::{ResolveError, Stage};
use crate::fetch::Fetcher;
use crate::model::{ChainStep, PageDiscovery, ResolveMode, ResolvedAsset, TargetDescriptor};

pub struct Resolver<F> {
    fetcher: F,
}

impl<F: Fetcher> Resolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolves the current content for `target`. Network reads only.
    pub async fn resolve(&self, target: &TargetDescriptor) -> Result<ResolvedAsset, ResolveError> {
        match &target.mode {
            ResolveMode::Static => {
                let content = self.get(target, Stage::Entry, &target.entry_url).await?;
                Ok(ResolvedAsset {
                    source_url: target.entry_url.clone(),
                    content,
                })
            }
            ResolveMode::SinglePage(page) => self.discover(target, page).await,
            ResolveMode::MultiStep { page, chain } => {
                let first = self.discover(target, page).await?;
                self.follow_chain(target, page, chain, &first).await
            }
        }
    }

    async fn discover(
        &self,
        target: &TargetDescriptor,
        page: &PageDiscovery,
    ) -> Result<ResolvedAsset, ResolveError> {
        let html = self.get(target, Stage::Entry, &target.entry_url).await?;
        let candidates = page.candidates(&html);
        debug!(target = %target.id, count = candidates.len(), "discovered candidates");
        if candidates.is_empty() {
            return Err(ResolveError::NoCandidates {
                url: target.entry_url.clone(),
            });
        }

        for candidate in &candidates {
            let url = candidate_url(&target.entry_url, page.url_prefix.as_deref(), candidate);
            match self.get(target, Stage::Candidate, &url).await {
                Ok(content) if page.verify.is_match(&content) => {
                    debug!(target = %target.id, url = %url, "candidate accepted");
                    return Ok(ResolvedAsset {
                        source_url: url,
                        content,
                    });
                }
                Ok(_) => debug!(target = %target.id, url = %url, "candidate rejected"),
                Err(e) => warn!(target = %target.id, url = %url, stage = %Stage::Candidate, error = %e, "candidate skipped"),
            }
        }

        Err(ResolveError::NoVerifiedCandidate {
            url: target.entry_url.clone(),
            tried: candidates.len(),
        })
    }

    // A missing capture is terminal even though another candidate might carry one.
    async fn follow_chain(
        &self,
        target: &TargetDescriptor,
        page: &PageDiscovery,
        chain: &ChainStep,
        first: &ResolvedAsset,
    ) -> Result<ResolvedAsset, ResolveError> {
        let captured = page
            .verify
            .captures(&first.content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ResolveError::MissingCapture {
                url: first.source_url.clone(),
            })?;

        let url = chain.url_for(&captured);
        debug!(target = %target.id, url = %url, "following chain");
        let content = self.get(target, Stage::Chain, &url).await?;
        if chain.verify.is_match(&content) {
            Ok(ResolvedAsset {
                source_url: url,
                content,
            })
        } else {
            Err(ResolveError::ChainRejected { url })
        }
    }

    async fn get(&self, target: &TargetDescriptor, stage: Stage, url: &str) -> Result<String, ResolveError> {
        self.fetcher
            .fetch(url, &target.headers)
            .await
            .map_err(|source| ResolveError::Network { stage, source })
    }
}

/// Prefix wins when configured; otherwise relative candidates resolve against the entry page.
pub fn candidate_url(entry_url: &str, prefix: Option<&str>, candidate: &str) -> String {
    if let Some(prefix) = prefix {
        return format!("{prefix}{candidate}");
    }
    Url::parse(entry_url)
        .and_then(|base| base.join(candidate))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| candidate.to_string())
}
