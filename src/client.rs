//! High level operations: list accounts and fetch statements.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::auth::Authenticator;
use crate::description::{DescriptionParser, StructuredDescriptionParser};
use crate::dialog::Dialog;
use crate::error::{Error, Result};
use crate::mt940_format::Mt940Parser;
use crate::response::Response;
use crate::segments::{
    SegmentBody, SegmentType, SepaAccounts, SepaAccountsRequest, StatementRequest,
    StatementResponse,
};
use crate::transport::Transport;
use crate::types::{SepaAccount, Statement};

/// Turns concatenated statement bodies into statements.
pub trait StatementParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Vec<Statement>>;
}

/// Send requests built by `build` until the bank stops announcing further
/// pages for `kind`. `build` receives the continuation token of the previous
/// page, `None` for the first one.
pub async fn fetch_pages<F>(
    dialog: &mut Dialog,
    auth: &dyn Authenticator,
    kind: &str,
    mut build: F,
) -> Result<Vec<Response>>
where
    F: FnMut(Option<String>) -> SegmentBody,
{
    let mut responses = Vec::new();
    let mut touchdown = None;
    loop {
        let mut request = auth.create_request(vec![build(touchdown.take())]);
        let response = dialog.send(&mut request).await?;
        touchdown = response.touchdown(&request, kind);
        responses.push(response);

        if touchdown.is_none() {
            break;
        }
        debug!(kind, page = responses.len(), "bank announced another page");
    }
    Ok(responses)
}

/// Accounts of every `HISPA` segment in `response`.
fn sepa_accounts(response: &Response) -> Result<Vec<SepaAccount>> {
    if response.find_segments(SepaAccounts::KIND).next().is_none() {
        return Err(Error::SegmentNotFound(SepaAccounts::KIND.to_string()));
    }
    Ok(response
        .find_all::<SepaAccounts>()
        .flat_map(|segment| segment.accounts.iter().cloned())
        .collect())
}

/// FinTS client for one bank user.
pub struct Client<A> {
    auth: A,
    transport: Arc<dyn Transport>,
    statement_parser: Arc<dyn StatementParser>,
    description_parser: Option<Arc<dyn DescriptionParser>>,
}

impl<A: Authenticator> Client<A> {
    /// Client with the MT940 reader and the structured description parser.
    pub fn new(auth: A, transport: Arc<dyn Transport>) -> Self {
        Client {
            auth,
            transport,
            statement_parser: Arc::new(Mt940Parser::new()),
            description_parser: Some(Arc::new(StructuredDescriptionParser::new())),
        }
    }

    pub fn with_statement_parser(mut self, parser: Arc<dyn StatementParser>) -> Self {
        self.statement_parser = parser;
        self
    }

    /// `None` leaves every description unstructured.
    pub fn with_description_parser(mut self, parser: Option<Arc<dyn DescriptionParser>>) -> Self {
        self.description_parser = parser;
        self
    }

    pub fn authenticator(&self) -> &A {
        &self.auth
    }

    /// SEPA accounts of the user.
    #[instrument(skip_all)]
    pub async fn accounts(&self) -> Result<Vec<SepaAccount>> {
        let mut dialog = self.open_dialog().await?;

        let mut request = self
            .auth
            .create_request(vec![SepaAccountsRequest::default().into()]);
        let response = dialog.send(&mut request).await?;
        dialog.end(&self.auth).await?;

        let accounts = sepa_accounts(&response)?;
        info!(accounts = accounts.len(), "fetched accounts");
        Ok(accounts)
    }

    /// Booked statements of `account` between `start` and `end`.
    #[instrument(skip_all, fields(account = %account, start = %start, end = %end))]
    pub async fn statements(
        &self,
        account: &SepaAccount,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Statement>> {
        let mut dialog = self.open_dialog().await?;

        let responses = fetch_pages(&mut dialog, &self.auth, StatementRequest::KIND, |touchdown| {
            StatementRequest::new(account.clone(), start, end)
                .with_touchdown(touchdown)
                .into()
        })
        .await?;
        dialog.end(&self.auth).await?;

        let booked: String = responses
            .iter()
            .flat_map(|response| response.find_all::<StatementResponse>())
            .map(|page| page.booked.as_str())
            .collect();

        let mut statements = self.statement_parser.parse(&booked)?;
        if let Some(parser) = &self.description_parser {
            for transaction in statements
                .iter_mut()
                .flat_map(|statement| statement.transactions.iter_mut())
            {
                transaction.structured_description = parser.parse(&transaction.description);
            }
        }
        info!(
            pages = responses.len(),
            statements = statements.len(),
            "fetched statements"
        );
        Ok(statements)
    }

    async fn open_dialog(&self) -> Result<Dialog> {
        let mut dialog = self.auth.create_dialog(self.transport.clone());
        dialog.sync(&self.auth).await?;
        dialog.init(&self.auth).await?;
        Ok(dialog)
    }
}
