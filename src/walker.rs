//! Common load balancer traversal structures for AWS ELBv2.
//!
//! This module doesn't contain anything special beyond a pseudo-iterator
//! to walk over load balancers in a region in a more idiomatic manner. At
//! some point (hopefully soon) this will change to use an asynchronous
//! `Stream`, when Rusoto migrates to Futures 0.3 and beyond.
use crate::reconcile::StageError;
use crate::types::{error_message, UtilResult};
use rusoto_elbv2::{DescribeLoadBalancersInput, Elb, ElbClient, LoadBalancer};
use std::future::Future;
use std::pin::Pin;

/// Pseudo `Iterator` structure to walk over `LoadBalancer` types in AWS.
///
/// As this is a fallible iteration, a `for` style loop cannot be used
/// easily. Instead, this pattern must be used:
///
/// ```rust
/// let walker = BalancerWalker::new(...);
///
/// while let Some(balancer) = walker.next()? {
///     // do something...
/// }
/// ```
///
/// Even though this isn't as convenient as `for`, it's still much
/// cleaner than manually iterating the paginated describe calls.
pub struct BalancerWalker<'a> {
    elb: &'a ElbClient,
    marker: Option<String>,
    buffer: Vec<LoadBalancer>,
    finished: bool,
}

impl<'a> BalancerWalker<'a> {
    /// Construct a new `BalancerWalker` for the client's region.
    pub fn new(elb: &'a ElbClient) -> Self {
        Self {
            elb,
            marker: None,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Attempts to fetch the next `LoadBalancer` in the region.
    ///
    /// Calls can fail, which is why a `Result` is returned. Even if a call
    /// succeeds there is no guarantee a `LoadBalancer` exists, which is why
    /// an `Option` is returned.
    ///
    /// Calling this method does not guarantee a call will be made to AWS;
    /// there may already be buffered data to be returned immediately.
    pub fn next(&mut self) -> Pin<Box<dyn Future<Output = UtilResult<Option<LoadBalancer>>> + '_>> {
        Box::pin(async move {
            // always check the buffer first
            if !self.buffer.is_empty() {
                return Ok(Some(self.buffer.remove(0)));
            }

            // if done, no fetch
            if self.finished {
                return Ok(None);
            }

            // create a request to describe the next page
            let request = DescribeLoadBalancersInput {
                marker: self.marker.clone(),
                ..DescribeLoadBalancersInput::default()
            };

            // execute the request and await the response (blocking)
            let response = self
                .elb
                .describe_load_balancers(request)
                .await
                .map_err(|err| StageError::Enumeration(error_message(err)))?;

            // check contents (although should always be there)
            if response.load_balancers.is_none() {
                return Ok(None);
            }

            // store the page and next identifier
            self.buffer = response.load_balancers.unwrap();
            self.marker = response.next_marker;

            // check for last page
            if self.marker == None {
                self.finished = true;
            }

            // pass back
            self.next().await
        })
    }
}
