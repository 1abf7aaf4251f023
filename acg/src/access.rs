//! Enumeration of the accounts and roles reachable with an access token.

use crate::sso::{AccessToken, AccountInfo, Error, Provider, Result, RoleInfo};
use crate::tokio::Cancel;
use crate::{Event, Handler};


/// Maximum number of accounts requested per page.
pub const ACCOUNTS_PAGE_SIZE: u32 = 50;

/// An account with all the roles that can be assumed in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAccess {
    pub account: AccountInfo,
    pub roles: Vec<RoleInfo>,
}

/// List all accounts reachable with the given token, following continuation tokens
/// until the last page. Accounts are returned in provider order and any page error
/// aborts the whole listing.
pub fn list_accounts(mut provider: impl Provider, token: &AccessToken) -> Result<Vec<AccountInfo>> {

    let mut accounts = Vec::new();
    let mut next_token = None::<String>;

    loop {

        let page = provider.list_accounts(token, next_token.as_deref(), Some(ACCOUNTS_PAGE_SIZE))?;
        tracing::debug!(count = page.items.len(), next = page.next_token.is_some(), "received accounts page");
        accounts.extend(page.items);

        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break,
        }

    }

    Ok(accounts)

}

/// List the roles of a single account, with a single request using the provider's
/// default page size.
pub fn list_roles(mut provider: impl Provider, token: &AccessToken, account: &AccountInfo) -> Result<Vec<RoleInfo>> {
    let page = provider.list_account_roles(token, &account.id, None, None)?;
    if page.next_token.is_some() {
        tracing::debug!(account = %account.id, "ignoring roles beyond the first page");
    }
    Ok(page.items)
}

/// List every account and then the roles of each account, in account order. The cancel
/// handle is checked before each request.
pub fn collect(
    mut provider: impl Provider,
    token: &AccessToken,
    cancel: &Cancel,
    mut handler: impl Handler,
) -> Result<Vec<AccountAccess>> {

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    handler.on_event(Event::ListAccounts);
    let accounts = list_accounts(&mut provider, token)?;
    handler.on_event(Event::ListedAccounts { accounts: &accounts });

    let mut access = Vec::with_capacity(accounts.len());
    for account in accounts {

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let roles = list_roles(&mut provider, token, &account)?;
        handler.on_event(Event::ListedRoles { account: &account, roles: &roles });
        access.push(AccountAccess { account, roles });

    }

    Ok(access)

}
