//! Resolver chain
//!
//! An ordered list of sources walked per question. A miss falls through to
//! the next source; a hard failure is logged and skipped so one broken
//! source never masks the ones behind it. The chain is immutable once
//! built and replaced wholesale on reconfiguration.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::MemoryCache;
use crate::error::Result;
use crate::source::Source;
use crate::wire::{Message, Question, Rcode, Record, RecordType};

/// A chain entry: a source plus the name it is logged under
pub struct NamedSource {
    name: String,
    source: Arc<dyn Source>,
}

impl NamedSource {
    pub fn new(name: impl Into<String>, source: Arc<dyn Source>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Decorator that writes successful answers of the wrapped source into the
/// cache. Resolution success is independent of caching success; a record
/// the cache rejects (budget, TTL floor) is still returned.
pub struct CacheFeeder {
    inner: Arc<dyn Source>,
    cache: Arc<MemoryCache>,
}

impl CacheFeeder {
    pub fn new(inner: Arc<dyn Source>, cache: Arc<MemoryCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Source for CacheFeeder {
    async fn resolve_v4(&self, name: &str) -> Result<Record> {
        let record = self.inner.resolve_v4(name).await?;
        self.cache.feed(record.clone()).await;
        Ok(record)
    }

    async fn resolve_v6(&self, name: &str) -> Result<Record> {
        let record = self.inner.resolve_v6(name).await?;
        self.cache.feed(record.clone()).await;
        Ok(record)
    }

    async fn forward(&self, question: &Question) -> Result<Vec<Record>> {
        let records = self.inner.forward(question).await?;
        for record in &records {
            self.cache.feed(record.clone()).await;
        }
        Ok(records)
    }

    async fn feed(&self, record: Record) {
        self.inner.feed(record).await;
    }
}

enum QuestionOutcome {
    Answered(Vec<Record>),
    NoAnswer,
    Failed,
}

/// Ordered composition of sources
pub struct ResolverChain {
    resolvers: Vec<NamedSource>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<NamedSource>) -> Self {
        Self { resolvers }
    }

    /// Resolve a request into a complete reply message
    ///
    /// Every question is answered independently, in order, with answers
    /// appended in question order. Zero-question requests get FORMERR and
    /// non-query opcodes get NOTIMP. When nothing answers, the reply is
    /// NXDOMAIN, or SERVFAIL if the final source failed hard.
    pub async fn resolve(&self, request: &Message) -> Message {
        let mut reply = Message::reply_to(request);

        if request.flags.opcode() != 0 {
            reply.flags.set_rcode(Rcode::NotImp);
            return reply;
        }
        if request.questions.is_empty() {
            reply.flags.set_rcode(Rcode::FormErr);
            return reply;
        }

        let mut answered = false;
        let mut failed = false;
        for question in &request.questions {
            match self.resolve_question(question).await {
                QuestionOutcome::Answered(records) => {
                    answered = true;
                    reply.answers.extend(records);
                }
                QuestionOutcome::NoAnswer => {}
                QuestionOutcome::Failed => failed = true,
            }
        }

        let rcode = if answered {
            Rcode::NoError
        } else if failed {
            Rcode::ServFail
        } else {
            Rcode::NxDomain
        };
        reply.flags.set_rcode(rcode);
        reply
    }

    async fn resolve_question(&self, question: &Question) -> QuestionOutcome {
        let last = self.resolvers.len().saturating_sub(1);
        for (index, resolver) in self.resolvers.iter().enumerate() {
            let outcome = match question.qtype {
                RecordType::A => resolver
                    .source
                    .resolve_v4(&question.name)
                    .await
                    .map(|record| vec![record]),
                RecordType::Aaaa => resolver
                    .source
                    .resolve_v6(&question.name)
                    .await
                    .map(|record| vec![record]),
                RecordType::Other(_) => resolver.source.forward(question).await,
            };

            match outcome {
                Ok(records) => {
                    debug!("{} answered {}", resolver.name, question.name);
                    return QuestionOutcome::Answered(records);
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    warn!(
                        "resolver {} failed for {}: {}",
                        resolver.name, question.name, err
                    );
                    if index == last {
                        return QuestionOutcome::Failed;
                    }
                }
            }
        }
        QuestionOutcome::NoAnswer
    }
}
