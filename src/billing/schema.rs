//! Database objects answering "is this user premium" on top of the
//! `stripe` schema maintained by the billing sync engine.
//!
//! Both statements are `create or replace`, so the script can be re-run.

pub const USER_ENTITLEMENTS_VIEW: &str = r#"create or replace view public.user_entitlements as
select
  (c.metadata->>'supabase_user_id')::uuid as user_id,
  bool_or(s.status in ('active','trialing')) as is_premium,
  max(s.current_period_end) as premium_current_period_end
from stripe.customers c
left join stripe.subscriptions s on s.customer = c.id
where c.metadata ? 'supabase_user_id'
group by 1;
"#;

pub const IS_PREMIUM_FUNCTION: &str = r#"create or replace function public.is_premium(p_user_id uuid)
returns boolean
language plpgsql
stable
as $$
begin
  if to_regclass('public.user_entitlements') is null then
    return false;
  end if;

  return coalesce(
    (select ue.is_premium from public.user_entitlements ue where ue.user_id = p_user_id),
    false
  );
end;
$$;
"#;

/// The full script, wrapped in one transaction.
pub fn entitlements_sql() -> String {
    format!(
        "begin;\n\n{}\n{}\ncommit;\n",
        USER_ENTITLEMENTS_VIEW, IS_PREMIUM_FUNCTION
    )
}
